//! Campaign command handlers. These only touch the campaign file, never the
//! database.

use anyhow::Context;
use campdash_core::{
    group_by_month, parse_group_list, AppConfig, Campaign, CampaignDraft, CampaignStore, GoalType,
};
use chrono::NaiveDate;
use clap::Subcommand;

/// Sub-commands available under `campaign`.
#[derive(Debug, Subcommand)]
pub enum CampaignCommands {
    /// Validate and save a new campaign
    Add {
        #[arg(long)]
        name: String,
        /// Supplier name exactly as registered on products
        #[arg(long)]
        supplier: String,
        /// Product group codes separated by ';'
        #[arg(long)]
        groups: String,
        /// First day of the campaign (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the campaign, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Unit target across all stores
        #[arg(long, conflicts_with = "store_targets")]
        overall_target: Option<i64>,
        /// Unit target for one store as CODE=N; repeat for each store
        #[arg(long = "store-target", value_parser = parse_store_target)]
        store_targets: Vec<(String, i64)>,
    },
    /// List saved campaigns grouped by start month
    List,
}

/// Arguments of `campaign add`, unpacked from [`CampaignCommands::Add`].
#[derive(Debug)]
pub(crate) struct AddArgs {
    pub name: String,
    pub supplier: String,
    pub groups: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub overall_target: Option<i64>,
    pub store_targets: Vec<(String, i64)>,
}

/// Parse a `CODE=N` store target.
pub(crate) fn parse_store_target(raw: &str) -> Result<(String, i64), String> {
    let (code, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=N, got '{raw}'"))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing store code in '{raw}'"));
    }
    let target = target
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid target in '{raw}': {e}"))?;
    Ok((code.to_string(), target))
}

/// Store targets make the goal per-store; otherwise it is overall, with a
/// missing `--overall-target` meaning zero.
pub(crate) fn build_draft(args: AddArgs) -> CampaignDraft {
    let goal_type = if args.store_targets.is_empty() {
        GoalType::Overall
    } else {
        GoalType::PerStore
    };
    CampaignDraft {
        name: args.name,
        supplier: args.supplier,
        groups: parse_group_list(&args.groups),
        start_date: args.start,
        end_date: args.end,
        goal_type,
        overall_target: args.overall_target.unwrap_or(0),
        per_store_targets: args.store_targets.into_iter().collect(),
    }
}

/// Validate and append a campaign to the campaign file.
///
/// # Errors
///
/// Returns an error if validation fails or the file cannot be written.
/// Nothing is written when validation fails.
pub(crate) fn run_campaign_add(config: &AppConfig, args: AddArgs) -> anyhow::Result<()> {
    let campaign = Campaign::try_from_draft(build_draft(args)).context("invalid campaign")?;
    let store = CampaignStore::new(&config.campaigns_path);
    store.append(&campaign)?;

    println!(
        "saved campaign '{}' ({}, {} to {}) to {}",
        campaign.name(),
        campaign.goal_type(),
        campaign.start_date(),
        campaign.end_date(),
        store.path().display()
    );
    Ok(())
}

/// Print saved campaigns grouped by start month.
///
/// # Errors
///
/// Returns an error if the campaign file exists but cannot be read.
pub(crate) fn run_campaign_list(config: &AppConfig) -> anyhow::Result<()> {
    let campaigns = CampaignStore::new(&config.campaigns_path).load()?;
    if campaigns.is_empty() {
        println!("no campaigns saved; run `campaign add` first");
        return Ok(());
    }

    for month in group_by_month(&campaigns) {
        println!("{}", month.label());
        println!(
            "  {:<28}{:<16}{:<12}{:<12}{:<10}GROUPS",
            "NAME", "SUPPLIER", "START", "END", "GOAL"
        );
        for campaign in &month.campaigns {
            println!(
                "  {:<28}{:<16}{:<12}{:<12}{:<10}{}",
                campaign.name(),
                campaign.supplier(),
                campaign.start_date(),
                campaign.end_date(),
                goal_summary(campaign),
                campaign.groups_joined()
            );
        }
    }
    Ok(())
}

fn goal_summary(campaign: &Campaign) -> String {
    match campaign.goal_type() {
        GoalType::Overall => campaign.overall_target().to_string(),
        GoalType::PerStore => format!("{} stores", campaign.per_store_targets().len()),
    }
}
