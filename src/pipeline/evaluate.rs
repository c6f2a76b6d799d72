//! Evaluation stage: LLM-as-judge scoring of drafted docs

use super::{PipelineState, Stage};
use crate::error::Result;
use crate::llm::{JudgePrompt, TextGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Judge verdict for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreRecord {
    /// All five rubric scores, each 1-5
    Scored {
        correctness: u8,
        coverage: u8,
        clarity: u8,
        consistency: u8,
        overall_score: u8,
    },
    /// The judge did not answer with the expected JSON
    Unparsed { raw_response: String },
}

impl ScoreRecord {
    pub fn is_scored(&self) -> bool {
        matches!(self, ScoreRecord::Scored { .. })
    }

    pub fn overall_score(&self) -> Option<u8> {
        match self {
            ScoreRecord::Scored { overall_score, .. } => Some(*overall_score),
            ScoreRecord::Unparsed { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct JudgeScores {
    correctness: u8,
    coverage: u8,
    clarity: u8,
    consistency: u8,
    overall_score: u8,
}

/// Interpret a judge reply
///
/// Never fails: anything other than a JSON object with the five rubric
/// fields as integers in 1..=5 becomes [`ScoreRecord::Unparsed`].
pub fn parse_judge_response(text: &str) -> ScoreRecord {
    let unparsed = || ScoreRecord::Unparsed {
        raw_response: text.to_string(),
    };

    let scores: JudgeScores = match serde_json::from_str(text.trim()) {
        Ok(scores) => scores,
        Err(e) => {
            tracing::debug!("Judge response is not valid score JSON: {}", e);
            return unparsed();
        }
    };

    let all = [
        scores.correctness,
        scores.coverage,
        scores.clarity,
        scores.consistency,
        scores.overall_score,
    ];
    if all.iter().any(|score| !(1..=5).contains(score)) {
        tracing::debug!("Judge scores out of range: {:?}", all);
        return unparsed();
    }

    ScoreRecord::Scored {
        correctness: scores.correctness,
        coverage: scores.coverage,
        clarity: scores.clarity,
        consistency: scores.consistency,
        overall_score: scores.overall_score,
    }
}

/// Scores drafted documentation against its source code
pub struct DocEvaluator {
    llm: Arc<dyn TextGenerator>,
}

impl DocEvaluator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Ask the judge to score one code/doc pair
    pub async fn evaluate(&self, code: &str, doc: &str) -> Result<ScoreRecord> {
        let request = JudgePrompt::request(code, doc);
        let response = self.llm.chat(&request).await?;
        Ok(parse_judge_response(&response.content))
    }
}

#[async_trait::async_trait]
impl Stage for DocEvaluator {
    fn name(&self) -> &'static str {
        "evaluate"
    }

    async fn apply(&self, mut state: PipelineState) -> Result<PipelineState> {
        for chunk in &state.selected_chunks {
            let doc = match state.draft_docs.get(&chunk.symbol_name) {
                Some(doc) if !doc.trim().is_empty() => doc,
                _ => {
                    tracing::debug!("No draft for {}, not evaluating", chunk.symbol_name);
                    continue;
                }
            };

            let record = self.evaluate(&chunk.code, doc).await?;
            if !record.is_scored() {
                tracing::warn!("Judge reply for {} could not be parsed", chunk.symbol_name);
            }
            state.evaluations.insert(chunk.symbol_name.clone(), record);
        }

        tracing::info!("Evaluated {} docs", state.evaluations.len());
        Ok(state)
    }
}

/// Mean rubric scores over a set of verdicts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Verdicts seen
    pub samples: usize,
    /// Verdicts that could not be parsed
    pub unparsed: usize,
    pub correctness: Option<f64>,
    pub coverage: Option<f64>,
    pub clarity: Option<f64>,
    pub consistency: Option<f64>,
    pub overall_score: Option<f64>,
}

impl EvaluationSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ScoreRecord>) -> Self {
        let mut samples = 0;
        let mut sums = [0u32; 5];
        let mut scored = 0u32;

        for record in records {
            samples += 1;
            if let ScoreRecord::Scored {
                correctness,
                coverage,
                clarity,
                consistency,
                overall_score,
            } = record
            {
                scored += 1;
                for (sum, score) in sums.iter_mut().zip([
                    correctness,
                    coverage,
                    clarity,
                    consistency,
                    overall_score,
                ]) {
                    *sum += u32::from(*score);
                }
            }
        }

        let mean = |sum: u32| (scored > 0).then(|| f64::from(sum) / f64::from(scored));

        Self {
            samples,
            unparsed: samples - scored as usize,
            correctness: mean(sums[0]),
            coverage: mean(sums[1]),
            clarity: mean(sums[2]),
            consistency: mean(sums[3]),
            overall_score: mean(sums[4]),
        }
    }

    /// `(metric, mean)` pairs in rubric order
    pub fn metrics(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("correctness", self.correctness),
            ("coverage", self.coverage),
            ("clarity", self.clarity),
            ("consistency", self.consistency),
            ("overall_score", self.overall_score),
        ]
    }
}
