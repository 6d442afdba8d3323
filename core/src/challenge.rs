//! The question lifecycle: open on a reached pause point, collect a
//! selection, check it, and resume playback on a pass.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use crate::api::{AnswerCheckRequest, AnswerChecker};
use crate::detector::{CheckpointDetector, Reached};
use crate::error::ChallengeError;
use crate::media::PlaybackAdapter;
use crate::model::{BlockKey, PausePoint};
use crate::store::CompletionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub passed: bool,
    pub message: String,
}

/// The question currently blocking playback. At most one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveChallenge {
    pub key: BlockKey,
    pub point: PausePoint,
    pub selected_choice_ids: Vec<String>,
    pub last_result: Option<AnswerResult>,
    /// An answer check is in flight.
    pub submitting: bool,
}

impl ActiveChallenge {
    fn new(reached: &Reached) -> Self {
        Self {
            key: reached.key.clone(),
            point: reached.point.clone(),
            selected_choice_ids: Vec::new(),
            last_result: None,
            submitting: false,
        }
    }

    pub fn is_selected(&self, choice_id: &str) -> bool {
        self.selected_choice_ids.iter().any(|id| id == choice_id)
    }
}

/// What happened to playback after a passing answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResumeAction {
    /// Seeked just past the pause point and resumed.
    SeekAndPlay { to: f64 },
    /// No control channel; the learner continues on their own.
    LeftToLearner,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Passed {
        key: BlockKey,
        message: String,
        correct_choice_ids: Option<Vec<String>>,
        resume: ResumeAction,
    },
    /// Wrong answer; the challenge stays open with its selection.
    Failed { message: String },
}

pub struct ChallengeController {
    checker: Arc<dyn AnswerChecker>,
    store: Arc<CompletionStore>,
    resume_offset: f64,
    active: Mutex<Option<ActiveChallenge>>,
}

impl ChallengeController {
    pub fn new(
        checker: Arc<dyn AnswerChecker>,
        store: Arc<CompletionStore>,
        resume_offset_seconds: f64,
    ) -> Self {
        Self {
            checker,
            store,
            resume_offset: resume_offset_seconds,
            active: Mutex::new(None),
        }
    }

    /// Open a challenge for a reached pause point. Refuses when one is
    /// already open.
    pub fn open(&self, reached: &Reached) -> bool {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            warn!(
                "Refusing to open {} while {} is still active",
                reached.key, current.key
            );
            return false;
        }
        info!("Challenge opened for {}", reached.key);
        *active = Some(ActiveChallenge::new(reached));
        true
    }

    pub fn active(&self) -> Option<ActiveChallenge> {
        self.active.lock().clone()
    }

    pub fn has_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Select a choice: replaces the selection for single-answer questions,
    /// adds to it for multiple-answer ones.
    pub fn select_choice(&self, choice_id: &str) -> Result<(), ChallengeError> {
        self.update_selection(choice_id, |selected, multiple| {
            if !multiple {
                selected.clear();
            }
            if !selected.iter().any(|id| id == choice_id) {
                selected.push(choice_id.to_string());
            }
        })
    }

    /// Toggle a choice: replaces the selection for single-answer questions,
    /// flips membership for multiple-answer ones.
    pub fn toggle_choice(&self, choice_id: &str) -> Result<(), ChallengeError> {
        self.update_selection(choice_id, |selected, multiple| {
            if !multiple {
                *selected = vec![choice_id.to_string()];
            } else if let Some(pos) = selected.iter().position(|id| id == choice_id) {
                selected.remove(pos);
            } else {
                selected.push(choice_id.to_string());
            }
        })
    }

    fn update_selection(
        &self,
        choice_id: &str,
        apply: impl FnOnce(&mut Vec<String>, bool),
    ) -> Result<(), ChallengeError> {
        let mut active = self.active.lock();
        let challenge = active.as_mut().ok_or(ChallengeError::NoActiveChallenge)?;
        let question = &challenge.point.question;
        if !question.has_choice(choice_id) {
            return Err(ChallengeError::UnknownChoice(choice_id.to_string()));
        }
        apply(&mut challenge.selected_choice_ids, question.multiple);
        Ok(())
    }

    /// Drop the active challenge without resolving it (navigating away).
    ///
    /// The detector is re-armed, so the unsolved point fires again the next
    /// time playback reaches it.
    pub fn dismiss(&self, detector: &CheckpointDetector) -> Option<ActiveChallenge> {
        let dismissed = self.active.lock().take();
        if let Some(challenge) = &dismissed {
            info!("Challenge for {} dismissed", challenge.key);
            if detector.suspended_on().as_ref() == Some(&challenge.key) {
                detector.resume();
            }
        }
        dismissed
    }

    /// Check the current selection.
    ///
    /// A failure of any kind leaves the challenge open for another try. On a
    /// pass the point is marked completed, the detector re-armed and, where
    /// the adapter can seek, playback resumes just after the pause point.
    pub async fn submit(
        &self,
        detector: &CheckpointDetector,
        adapter: &dyn PlaybackAdapter,
    ) -> Result<SubmitOutcome, ChallengeError> {
        let (key, selected) = {
            let mut active = self.active.lock();
            let challenge = active.as_mut().ok_or(ChallengeError::NoActiveChallenge)?;
            if challenge.submitting {
                return Err(ChallengeError::SubmissionInFlight);
            }
            if challenge.selected_choice_ids.is_empty() {
                return Err(ChallengeError::EmptySelection);
            }
            challenge.submitting = true;
            (challenge.key.clone(), challenge.selected_choice_ids.clone())
        };

        let result = self
            .checker
            .check(AnswerCheckRequest {
                block_id: key.to_string(),
                selected_choice_ids: selected,
            })
            .await;

        let mut active = self.active.lock();
        let Some(challenge) = active.as_mut().filter(|c| c.key == key) else {
            // Dismissed while the check was running; `dismiss` already
            // re-armed the detector. The server has still recorded a pass.
            if let Ok(response) = &result {
                if response.passed {
                    self.store
                        .mark_completed(&key, response.correct_choice_ids.clone());
                }
            }
            return Err(ChallengeError::NoActiveChallenge);
        };
        challenge.submitting = false;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Answer check for {} failed: {}", key, e);
                challenge.last_result = Some(AnswerResult {
                    passed: false,
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        if !response.passed {
            info!("Wrong answer for {}", key);
            challenge.last_result = Some(AnswerResult {
                passed: false,
                message: response.message.clone(),
            });
            return Ok(SubmitOutcome::Failed {
                message: response.message,
            });
        }

        let resolved = active.take();
        drop(active);
        let timestamp = resolved
            .map(|c| c.point.timestamp_seconds)
            .unwrap_or_default();

        self.store
            .mark_completed(&key, response.correct_choice_ids.clone());
        detector.resume();

        let resume = self.resume_playback(adapter, timestamp);
        info!("Challenge for {} passed, {:?}", key, resume);
        Ok(SubmitOutcome::Passed {
            key,
            message: response.message,
            correct_choice_ids: response.correct_choice_ids,
            resume,
        })
    }

    fn resume_playback(&self, adapter: &dyn PlaybackAdapter, timestamp: f64) -> ResumeAction {
        if !adapter.capabilities().can_seek {
            return ResumeAction::LeftToLearner;
        }
        let to = timestamp + self.resume_offset;
        match adapter.seek_to(to) {
            Ok(()) => {
                adapter.play();
                ResumeAction::SeekAndPlay { to }
            }
            Err(e) => {
                warn!("Could not resume {} playback: {}", adapter.provider(), e);
                ResumeAction::LeftToLearner
            }
        }
    }
}
