//! One-shot searches from the command line.

use anyhow::{Context, anyhow};

use civreg_search::RegistrySearchService;
use civreg_search::types::{
    DateRange, RegistrationStatus, ResourceKind, SearchCriteria, SearchResults, parse_fhir_date,
};

use crate::config::SearchArgs;

/// Builds search criteria from command-line arguments.
pub fn criteria_from_args(args: &SearchArgs) -> anyhow::Result<SearchCriteria> {
    let resource_type = args
        .resource_type
        .as_deref()
        .map(str::parse::<ResourceKind>)
        .transpose()?;

    let statuses = args
        .status
        .iter()
        .map(|s| s.trim().parse::<RegistrationStatus>())
        .collect::<Result<Vec<_>, _>>()?;

    let from = args.from.as_deref().map(parse_date).transpose()?;
    let to = args.to.as_deref().map(parse_date).transpose()?;
    let date_range = (from.is_some() || to.is_some()).then_some(DateRange { from, to });

    Ok(SearchCriteria {
        resource_type,
        tracking_id: args.tracking_id.clone(),
        registration_number: args.registration_number.clone(),
        statuses,
        date_range,
        text: args.text.clone(),
        offset: args.offset,
        count: args.count,
    })
}

fn parse_date(raw: &str) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    parse_fhir_date(raw).ok_or_else(|| {
        anyhow!("Invalid date '{raw}', expected YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339")
    })
}

/// Runs the search described by `args`.
pub async fn run(
    service: &RegistrySearchService,
    token: &str,
    args: &SearchArgs,
) -> anyhow::Result<SearchResults> {
    let criteria = criteria_from_args(args)?;
    service
        .search(token, &criteria)
        .await
        .context("Search failed")
}
