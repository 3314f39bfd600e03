use rand::distributions::Distribution;
use rand::Rng;

use crate::error::SimulationError;

use super::transition::TransitionModel;
use super::vocabulary::ActionId;

/// Draws finite trajectories from `start` to `end` on a [`TransitionModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainSimulator {
    max_steps: Option<usize>,
}

impl ChainSimulator {
    /// `max_steps` bounds the number of transitions per session. `None` runs
    /// until `end` is drawn, which never returns on a matrix with no path to `end`.
    pub fn new(max_steps: Option<usize>) -> Self {
        Self { max_steps }
    }

    /// Simulate one session. The result starts with `start`, ends with the
    /// only `end` in the sequence.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        model: &TransitionModel,
        rng: &mut R,
    ) -> Result<Vec<ActionId>, SimulationError> {
        let mut trajectory = vec![ActionId::START];
        let mut current = ActionId::START;
        let mut steps = 0usize;

        loop {
            if let Some(max_steps) = self.max_steps {
                if steps >= max_steps {
                    return Err(SimulationError::SessionTooLong { max_steps });
                }
            }

            let next = model.next_action_distribution(current).sample(rng);
            trajectory.push(next);
            steps += 1;

            if next == ActionId::END {
                return Ok(trajectory);
            }
            current = next;
        }
    }
}
