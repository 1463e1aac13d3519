use clap::Args;
use petition_match::config::AppConfig;
use petition_match::error::AppError;
use petition_match::telemetry;
use petition_match::workflows::eligibility::{
    EligibilityResult, EligibilityService, OpenAiReasoningClient, PetitionId, ProfileId,
};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::infra::{JsonPetitionStore, JsonProfileStore};

#[derive(Args, Debug, Clone)]
pub(crate) struct CheckArgs {
    /// Profile identifier, e.g. P001
    #[arg(long)]
    pub(crate) profile: String,
    /// Restrict the evaluation to one petition
    #[arg(long)]
    pub(crate) petition: Option<u32>,
    /// Print the raw result array as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = EligibilityService::new(
        Arc::new(JsonProfileStore::new(config.storage.profiles_path())),
        Arc::new(JsonPetitionStore::new(config.storage.petitions_path())),
        Arc::new(OpenAiReasoningClient::new(config.reasoning.clone())),
    );

    let profile_id = ProfileId(args.profile.clone());
    let results = service
        .check_eligibility(&profile_id, args.petition.map(PetitionId))
        .await?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&results)?;
        println!("{rendered}");
    } else {
        print!("{}", render_results(&profile_id, &results));
    }
    Ok(())
}

pub(crate) fn render_results(profile_id: &ProfileId, results: &[EligibilityResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Eligibility for profile {profile_id}");

    if results.is_empty() {
        let _ = writeln!(out, "  No petitions to evaluate");
        return out;
    }

    for (position, result) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. #{} {} - {} ({})",
            position + 1,
            result.petition_id,
            result.petition.country,
            result.petition.visa_type,
            result.petition.category
        );
        let _ = writeln!(out, "   {}", result.verdict());

        if let Some(reason) = result
            .overall_reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
        {
            let _ = writeln!(out, "   Reason: {reason}");
        }
        if let (Some(earned), Some(total)) = (result.points_earned, result.total_points) {
            let _ = writeln!(out, "   Points: {earned} / {total}");
        }
        if let Some(disqualifiers) = result
            .disqualifiers
            .as_ref()
            .filter(|list| !list.is_empty())
        {
            let _ = writeln!(out, "   Disqualifiers: {}", disqualifiers.join("; "));
        }
        if let Some(recommendations) = result
            .recommendations
            .as_ref()
            .filter(|list| !list.is_empty())
        {
            let _ = writeln!(out, "   Recommendations: {}", recommendations.join("; "));
        }
    }
    out
}
