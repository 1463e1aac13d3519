//! Rendering of the evaluation request sent to the reasoning service.
//!
//! The request embeds the profile and petitions verbatim alongside the fixed evaluation
//! rules and the output schema the normalizer understands.

use serde::Serialize;

use super::domain::{Petition, Profile};

pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert immigration petition matching engine.
You operate as a deterministic, rules-first evaluator, not a conversational assistant.

Your responsibility includes NORMALIZING and INTERPRETING profile attributes
that may vary by country, system, or convention.

You MUST respond with ONLY valid JSON, no markdown, no code blocks, just the raw JSON object.";

const PREAMBLE: &str = "\
You are an expert immigration petition matching engine.
You operate as a deterministic, rules-first evaluator, not a conversational assistant.

Your responsibility includes NORMALIZING and INTERPRETING profile attributes
that may vary by country, system, or convention.";

const OBJECTIVE: &str = "\
Inputs may contain country-specific definitions, terminology differences, or implicit standards.

---

OBJECTIVE
For the profile in profile_data:
- Evaluate ALL petitions in petition_data
- Match the profile to petitions accurately
- Handle cross-country, cross-system, and cross-standard differences correctly
- Produce a clear, auditable matching output";

const NORMALIZATION_RULES: &str = "\
NORMALIZATION & EQUIVALENCY LAYER (MANDATORY)

Before evaluation, perform a Normalization Pass on profile data.
This pass MUST standardize values, interpret equivalencies, and avoid literal string
comparison where meaning differs by context.

1. EDUCATION NORMALIZATION
Interpret education levels based on country-of-education norms, not labels alone.
Professional degrees (e.g. MBBS, B.Tech) must be mapped to equivalent levels.
Treat education as \"Equivalent Bachelor or higher\" if duration, rigor, and field meet
petition expectations. Do NOT reject solely due to naming differences.

2. EXPERIENCE & SKILL EQUIVALENCY
Normalize experience considering country-specific job role naming, industry conventions,
and academic vs industry experience where applicable. A \"Research Assistant\" in academia
may count as skilled experience if the petition allows it. Interpret internship vs
full-time distinctions cautiously.

3. LICENSING, TESTS & CREDENTIALS
Different test names (IELTS, CELPIP, TOEFL) may satisfy the same requirement. Interpret
scores relative to petition expectations. Local licenses may be equivalent to
international ones if functionally comparable.

4. LEGAL & EMPLOYMENT CONTEXT NORMALIZATION
Employer sponsorship terminology differs by country. Job offers may be implied via
contracts or nomination letters. Immigration status names may differ but represent
similar conditions.

5. BUSINESS & ENTREPRENEURSHIP CONTEXT
Startup accelerators, incubators, and VC backing may be country-specific. Treat
government-recognized entities as equivalent if functionally similar.

6. GENERAL RULE (CRITICAL)
NEVER rely on label names alone, country-specific jargon, or literal string equality.
ALWAYS evaluate functional equivalence, intent, and outcome relevance to petition
requirements. If equivalency is unclear, mark the match as \"Weak\" rather than rejecting
outright.";

const EVALUATION_ORDER: &str = "\
EVALUATION LOGIC (STRICT ORDER)

STEP 1: TARGET COUNTRY FILTER
Evaluate petitions for a match only if petition.country is in profile.target_countries.

STEP 2: HARD REQUIREMENT CHECK
After normalization, verify ALL hard_requirements. If any fail, reject.

STEP 3: DISQUALIFIER CHECK
If any disqualifier applies, reject.

STEP 4: POINT-BASED SCORING (when petition.scoring_weights is present)
For each category in scoring_weights (hard_requirements, soft_requirements,
legal_requirements, bonus_points), award the listed points for every requirement the
normalized profile satisfies. Report points_earned, total_points
(scoring_weights.total_points), match_percentage (points_earned / total_points * 100)
and the per-requirement points in points_breakdown.

STEP 5: SOFT REQUIREMENT SCORING
Evaluate alignment with soft_requirements using normalized values.

STEP 6: EDGE CASE HANDLING
Apply petition.edge_case_handling rules explicitly.

STEP 7: TIE-BREAKER RESOLUTION
Resolve overlaps using, in order: tie_breaker_priority (lower is stronger),
confidence_level, strength of normalized alignment. Report the outcome as
tie_breaker_rank starting at 1.

REJECTED PETITIONS STILL EARN POINTS (CRITICAL)
Even when a petition is rejected (country mismatch, failed hard requirement, or
disqualifier), compute and report the points for every requirement category the profile
DOES satisfy. Rejection must never zero out unrelated, genuinely met scoring categories.";

const STRENGTH_TAXONOMY: &str = "\
MATCH STRENGTH CLASSIFICATION
- Very Strong: match_percentage >= 85
- Strong: match_percentage >= 70 and < 85
- Weak: match_percentage >= 50 and < 70
- Rejected: match_percentage < 50, or any hard requirement or disqualifier failure";

const CONSTRAINTS: &str = "\
CRITICAL CONSTRAINTS
- Do NOT invent data
- Do NOT assume equivalence without justification
- Do NOT change the output schema
- Do NOT output explanations outside JSON
- Be conservative: downgrade confidence rather than reject when uncertain

---

BEGIN PROCESSING USING:
profile_data, petition_data";

const SECTION_BREAK: &str = "\n\n---\n\n";

/// Fully rendered request for a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationRequest {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no petitions supplied for evaluation")]
    EmptyPetitionSet,
    #[error("could not serialize evaluation inputs: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Render the request for one profile against `petitions` (in the given order).
pub fn build_request(
    profile: &Profile,
    petitions: &[Petition],
) -> Result<EvaluationRequest, RequestError> {
    if petitions.is_empty() {
        return Err(RequestError::EmptyPetitionSet);
    }

    let profile_data = serde_json::to_string_pretty(profile)?;
    let petition_data = serde_json::to_string_pretty(petitions)?;
    let profile_id = serde_json::to_string(&profile.profile_id)?;

    let mut prompt = String::with_capacity(
        profile_data.len() + petition_data.len() + PREAMBLE.len() * 16,
    );
    prompt.push_str(PREAMBLE);
    prompt.push_str(SECTION_BREAK);
    prompt.push_str("INPUTS\n1. profile_data: ");
    prompt.push_str(&profile_data);
    prompt.push_str("\n2. petition_data: ");
    prompt.push_str(&petition_data);
    prompt.push_str("\n\n");

    for section in [
        OBJECTIVE,
        NORMALIZATION_RULES,
        EVALUATION_ORDER,
        STRENGTH_TAXONOMY,
    ] {
        prompt.push_str(section);
        prompt.push_str(SECTION_BREAK);
    }

    prompt.push_str(&output_schema(&profile_id));
    prompt.push_str(SECTION_BREAK);
    prompt.push_str(CONSTRAINTS);

    Ok(EvaluationRequest {
        system: SYSTEM_INSTRUCTION.to_string(),
        prompt,
    })
}

fn output_schema(profile_id: &str) -> String {
    format!(
        r#"OUTPUT FORMAT (MANDATORY)

Return ONE JSON object ONLY:

{{
  "matching_results": [
    {{
      "profile_id": {profile_id},
      "matched_petitions": [
        {{
          "petition_id": <number>,
          "visa_type": "<string>",
          "country": "<string>",
          "match_strength": "<Very Strong | Strong | Weak>",
          "confidence_level": "<Low | Medium | High>",
          "points_earned": <number>,
          "total_points": <number>,
          "match_percentage": <number>,
          "points_breakdown": {{
            "<hard_requirements | soft_requirements | legal_requirements | bonus_points>": {{
              "<requirement name>": <points awarded>
            }}
          }},
          "reasoning": [
            "<explicit normalized reasoning>"
          ],
          "disqualifiers": ["<disqualifier that partially applies>"],
          "recommendations": ["<action that would strengthen the match>"],
          "tie_breaker_rank": <number>
        }}
      ],
      "rejected_petitions": [
        {{
          "petition_id": <number>,
          "visa_type": "<string>",
          "reason": "<explicit normalized rejection reason>",
          "failed_requirements": ["<requirement or disqualifier that failed>"],
          "points_earned": <number>,
          "total_points": <number>,
          "match_percentage": <number>,
          "points_breakdown": {{
            "<category>": {{ "<requirement name>": <points awarded> }}
          }},
          "reasoning": ["<explicit normalized reasoning>"]
        }}
      ]
    }}
  ]
}}

Omit the points fields only when petition.scoring_weights is absent."#
    )
}
