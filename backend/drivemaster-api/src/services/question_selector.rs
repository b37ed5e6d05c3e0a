use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::models::content::{JourneyEvent, Question};
use crate::models::Stage;
use crate::store::ContentStore;

/// Two-tier question selection for an event.
///
/// 1. The event's candidate ids, tried in random order; the first that
///    resolves to an active question wins.
/// 2. A uniform pick among all active questions of the journey's stage.
///
/// `NoContent` when both tiers come up empty.
pub async fn select_question<R>(
    content: &dyn ContentStore,
    event: &JourneyEvent,
    stage: Stage,
    rng: &mut R,
) -> EngineResult<Question>
where
    R: Rng + Send + ?Sized,
{
    if !event.question_ids.is_empty() {
        let mut candidates: Vec<&String> = event.question_ids.iter().collect();
        candidates.shuffle(rng);

        for question_id in candidates {
            match content.get_question(question_id).await? {
                Some(question) if question.is_active => return Ok(question),
                Some(_) => {
                    tracing::debug!("Skipping inactive question {}", question_id);
                }
                None => {
                    tracing::warn!(
                        "Event {} references missing question {}",
                        event.event_id,
                        question_id
                    );
                }
            }
        }
    }

    let mut pool = content.questions_by_stage(stage).await?;
    if pool.is_empty() {
        return Err(EngineError::no_content(format!(
            "no question available for event {} at stage {}",
            event.event_id, stage
        )));
    }

    let index = rng.random_range(0..pool.len());
    Ok(pool.swap_remove(index))
}
