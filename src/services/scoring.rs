//! Answer evaluation: correctness check and point computation.

/// Point constants applied to every answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Base points for a correct answer.
    pub correct_points: i32,
    /// Base points for a wrong answer (negative, no floor on totals).
    pub incorrect_penalty: i32,
    /// Extra points for a fast correct answer.
    pub speed_bonus: i32,
    /// Answers strictly faster than this earn the bonus.
    pub speed_bonus_threshold_ms: u64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            correct_points: 100,
            incorrect_penalty: -25,
            speed_bonus: 30,
            speed_bonus_threshold_ms: 10_000,
        }
    }
}

/// Result of evaluating one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Whether the normalized answers matched.
    pub is_correct: bool,
    /// Points before the speed bonus.
    pub base_points: i32,
    /// Speed bonus, zero unless correct and fast.
    pub bonus: i32,
    /// `base_points + bonus`.
    pub total_points: i32,
}

impl ScoringRules {
    /// Score `submitted` against `correct`.
    ///
    /// Both sides are trimmed and lowercased before an exact comparison. A
    /// missing response time never earns the bonus.
    pub fn evaluate(
        &self,
        submitted: &str,
        correct: &str,
        response_time_ms: Option<u64>,
    ) -> AnswerOutcome {
        let is_correct = normalize(submitted) == normalize(correct);
        let base_points = if is_correct {
            self.correct_points
        } else {
            self.incorrect_penalty
        };
        let fast = response_time_ms.is_some_and(|ms| ms < self.speed_bonus_threshold_ms);
        let bonus = if is_correct && fast { self.speed_bonus } else { 0 };

        AnswerOutcome {
            is_correct,
            base_points,
            bonus,
            total_points: base_points + bonus,
        }
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}
