use anyhow::{Result, anyhow};
use cuepoint_core::{ChallengeError, ResumeAction, SubmitOutcome};

use crate::app::{App, format_clock};

/// Command handler for the interactive session
pub struct CommandHandler;

impl CommandHandler {
    /// Parse and execute one input line
    pub async fn execute(app: &mut App, command_str: &str) -> Result<()> {
        let parts: Vec<&str> = command_str.trim().splitn(2, ' ').collect();
        let cmd = parts[0].to_lowercase();
        let args = parts.get(1).map(|s| s.trim());

        match cmd.as_str() {
            "" => {}
            "play" => {
                if app.session.active_challenge().is_some() {
                    return Err(anyhow!("Answer the question first"));
                }
                app.session.adapter().play();
            }
            "pause" => app.session.adapter().pause(),
            "seek" => {
                let args = args.ok_or_else(|| anyhow!("Seek command requires a position"))?;
                let position: f64 = args
                    .parse()
                    .map_err(|_| anyhow!("Invalid position: {}", args))?;
                app.session.adapter().seek_to(position)?;
            }
            "start" => {
                if app.session.start_manual_clock() {
                    app.set_status("Clock started");
                } else if app.session.capabilities().needs_manual_start {
                    app.set_status("Clock is already running");
                } else {
                    app.set_status("This player reports its own time, no need to start it");
                }
            }
            "pick" | "p" => {
                let args = args.ok_or_else(|| anyhow!("Pick requires a choice number or id"))?;
                let choice_id = Self::resolve_choice(app, args)?;
                app.session.toggle_choice(&choice_id)?;
                if let Some(challenge) = app.session.active_challenge() {
                    app.print_challenge(&challenge);
                }
            }
            "submit" | "s" => match app.session.submit().await {
                Ok(SubmitOutcome::Passed {
                    message, resume, ..
                }) => {
                    app.set_status(format!("Correct! {}", message));
                    match resume {
                        ResumeAction::SeekAndPlay { to } => {
                            app.set_status(format!("Resuming at {}", format_clock(to)))
                        }
                        ResumeAction::LeftToLearner => {
                            app.set_status("Continue watching in the embedded player")
                        }
                    }
                }
                Ok(SubmitOutcome::Failed { message }) => {
                    app.set_status(format!("Not quite: {}", message));
                }
                Err(ChallengeError::Checker(e)) => {
                    app.set_status(format!("Could not check the answer ({}), try again", e));
                }
                Err(e) => return Err(e.into()),
            },
            "status" => {
                let summary = app.session.summary();
                let position = app
                    .position()
                    .map(format_clock)
                    .unwrap_or_else(|| "--:--".to_string());
                app.set_status(format!(
                    "{} | {} of {} solved | {}",
                    position,
                    summary.completed,
                    summary.pause_points,
                    match app.session.suspended_on() {
                        Some(key) => format!("waiting on {}", key),
                        None => "watching".to_string(),
                    }
                ));
            }
            "help" | "h" | "?" => Self::print_help(),
            "quit" | "q" | "exit" => app.should_quit = true,
            _ => return Err(anyhow!("Unknown command: {}", cmd)),
        }

        Ok(())
    }

    /// Accept either a 1-based choice number or a raw choice id.
    fn resolve_choice(app: &App, arg: &str) -> Result<String> {
        let challenge = app
            .session
            .active_challenge()
            .ok_or(ChallengeError::NoActiveChallenge)?;
        let choices = &challenge.point.question.choices;
        if let Some(choice) = choices.iter().find(|c| c.id == arg) {
            return Ok(choice.id.clone());
        }
        arg.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| choices.get(i))
            .map(|c| c.id.clone())
            .ok_or_else(|| anyhow!("No choice {}", arg))
    }

    fn print_help() {
        println!("  play | pause | seek <seconds>   control playback");
        println!("  start                           start the clock (players without an API)");
        println!("  pick <n|id>                     select an answer");
        println!("  submit                          check the answer");
        println!("  status                          position and progress");
        println!("  quit");
    }
}
