//! `report` command: a markdown progress report for every saved campaign.

use std::fmt::{self, Write as _};

use anyhow::Context;
use campdash_core::{
    group_by_month, AppConfig, Campaign, CampaignProgress, CampaignStore, CatalogStore, GoalType,
};
use campdash_db::{load_stores_or_rebuild, MetricsEngine, PgSource};
use chrono::Utc;

/// A `(year, month)` filter parsed from `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    fn label(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

pub(crate) fn parse_month(raw: &str) -> Result<Month, String> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got '{raw}'"))?;
    let year = year
        .parse::<i32>()
        .map_err(|e| format!("invalid year in '{raw}': {e}"))?;
    let month = month
        .parse::<u32>()
        .map_err(|e| format!("invalid month in '{raw}': {e}"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month must be 01-12, got '{raw}'"));
    }
    Ok(Month { year, month })
}

/// One campaign's outcome. A failed metrics run keeps its message so the
/// rest of the report still renders.
pub(crate) struct CampaignOutcome<'a> {
    pub campaign: &'a Campaign,
    pub progress: Result<CampaignProgress, String>,
}

pub(crate) struct MonthSection<'a> {
    pub label: String,
    pub outcomes: Vec<CampaignOutcome<'a>>,
}

/// Compute progress for every campaign and print the markdown report.
///
/// # Errors
///
/// Returns an error if the campaign file or store catalog cannot be loaded.
/// Metrics failures for individual campaigns are logged and rendered in
/// place, not propagated.
pub(crate) async fn run_report(
    config: &AppConfig,
    source: PgSource,
    month: Option<Month>,
) -> anyhow::Result<()> {
    let campaigns = CampaignStore::new(&config.campaigns_path).load()?;
    if campaigns.is_empty() {
        println!("no campaigns to report");
        return Ok(());
    }

    let catalog = CatalogStore::new(&config.catalog_dir);
    let stores = load_stores_or_rebuild(&source, &catalog)
        .await
        .context("failed to load store catalog")?;

    let wanted = month.map(Month::label);
    let mut engine = MetricsEngine::new(source);
    let mut sections = Vec::new();

    for group in group_by_month(&campaigns) {
        let label = group.label();
        if wanted.as_ref().is_some_and(|w| *w != label) {
            continue;
        }

        let mut outcomes = Vec::with_capacity(group.campaigns.len());
        for campaign in group.campaigns {
            let progress = match engine.campaign_progress(campaign, &stores).await {
                Ok(progress) => Ok(progress),
                Err(e) => {
                    tracing::warn!(
                        campaign = campaign.name(),
                        error = %e,
                        "metrics failed for campaign"
                    );
                    Err(e.to_string())
                }
            };
            outcomes.push(CampaignOutcome { campaign, progress });
        }
        sections.push(MonthSection { label, outcomes });
    }

    if sections.is_empty() {
        println!(
            "no campaigns start in {}",
            wanted.unwrap_or_else(|| "the selected month".to_string())
        );
        return Ok(());
    }

    let generated = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    print!(
        "{}",
        render_report(&generated, &sections).context("failed to render report")?
    );
    Ok(())
}

/// Render month sections as markdown.
pub(crate) fn render_report(
    generated: &str,
    sections: &[MonthSection<'_>],
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "# Campaign Report\n")?;
    writeln!(out, "**Generated**: {generated}\n")?;

    for section in sections {
        writeln!(out, "## {}\n", section.label)?;
        for outcome in &section.outcomes {
            render_campaign(&mut out, outcome)?;
        }
    }
    Ok(out)
}

fn render_campaign(out: &mut String, outcome: &CampaignOutcome<'_>) -> fmt::Result {
    let campaign = outcome.campaign;
    writeln!(out, "### {}\n", campaign.name())?;
    writeln!(
        out,
        "- **Supplier**: {}\n- **Groups**: {}\n- **Period**: {} to {}\n- **Goal**: {}\n",
        campaign.supplier(),
        campaign.groups_joined(),
        campaign.start_date(),
        campaign.end_date(),
        campaign.goal_type()
    )?;

    let progress = match &outcome.progress {
        Ok(progress) => progress,
        Err(message) => return writeln!(out, "> metrics unavailable: {message}\n"),
    };

    writeln!(out, "| Sold | Returned | Net |")?;
    writeln!(out, "|-----:|---------:|----:|")?;
    writeln!(
        out,
        "| {} | {} | {} |\n",
        progress.total_gross, progress.total_returned, progress.total_net
    )?;

    match progress.goal_type {
        GoalType::Overall => {
            writeln!(out, "| Target | Achieved | % |")?;
            writeln!(out, "|-------:|---------:|--:|")?;
        }
        GoalType::PerStore => {
            writeln!(out, "| Store | Target | Achieved | % |")?;
            writeln!(out, "|-------|-------:|---------:|--:|")?;
        }
    }
    for line in &progress.targets {
        let cells = format!("{} | {} | {:.1}%", line.target, line.achieved, line.percentage);
        match &line.store_code {
            None => writeln!(out, "| {cells} |")?,
            Some(code) => {
                let store = line
                    .store_name
                    .as_ref()
                    .map_or_else(|| code.clone(), |name| format!("{code} {name}"));
                writeln!(out, "| {store} | {cells} |")?;
            }
        }
    }
    writeln!(out)
}
