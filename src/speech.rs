//! Speech input/output through external commands.
//!
//! Recognition and synthesis are mutually exclusive: starting one stops the other.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::events::AppEvent;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup so a synthesizer reads only the words.
pub fn clean_text_for_speech(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = CODE.replace_all(&text, "$1");
    let text = HEADER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = NEWLINES.replace_all(text.trim(), ". ");
    let text = SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechActivity {
    Idle,
    Listening,
    Speaking,
}

/// Owns the single active speech session
pub struct SpeechCoordinator {
    synthesize_command: Vec<String>,
    recognize_command: Vec<String>,
    enabled: bool,
    queue: VecDeque<String>,
    speaker: Option<Child>,
    listener: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl SpeechCoordinator {
    pub fn new(config: &SpeechConfig, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            synthesize_command: config.synthesize_command.clone(),
            recognize_command: config.recognize_command.clone(),
            enabled: config.enabled,
            queue: VecDeque::new(),
            speaker: None,
            listener: None,
            events,
        }
    }

    /// Whether bot messages are spoken
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn activity(&mut self) -> SpeechActivity {
        if self.is_listening() {
            SpeechActivity::Listening
        } else if self.is_speaking() {
            SpeechActivity::Speaking
        } else {
            SpeechActivity::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn is_speaking(&mut self) -> bool {
        match self.speaker.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Queue `text` for synthesis. Stops any active recognition.
    pub fn speak(&mut self, text: &str) {
        if !self.enabled || self.synthesize_command.is_empty() {
            return;
        }

        let cleaned = clean_text_for_speech(text);
        if cleaned.is_empty() {
            return;
        }

        self.stop_listening();
        self.queue.push_back(cleaned);
        self.pump();
    }

    /// Start the next queued utterance once the current one has finished.
    pub fn tick(&mut self) {
        self.pump();
    }

    fn pump(&mut self) {
        if self.is_speaking() {
            return;
        }
        self.speaker = None;

        while let Some(next) = self.queue.pop_front() {
            match self.spawn_synthesizer(&next) {
                Ok(child) => {
                    self.speaker = Some(child);
                    break;
                }
                Err(e) => tracing::warn!(error = %e, "speech synthesis failed to start"),
            }
        }
    }

    fn spawn_synthesizer(&self, text: &str) -> std::io::Result<Child> {
        let (program, args) = match self.synthesize_command.split_first() {
            Some(split) => split,
            None => return Err(std::io::Error::other("no synthesize command configured")),
        };

        Command::new(program)
            .args(args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    /// Mute or unmute bot speech. Returns the new state.
    pub fn toggle_synthesis(&mut self) -> bool {
        self.enabled = !self.enabled;
        if !self.enabled {
            self.stop_speaking();
        }
        tracing::info!(enabled = self.enabled, "speech synthesis toggled");
        self.enabled
    }

    pub fn stop_speaking(&mut self) {
        self.queue.clear();
        if let Some(mut child) = self.speaker.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "synthesizer already exited");
            }
        }
    }

    /// Start listening, or stop if already listening. Returns whether listening is now active.
    ///
    /// The transcript arrives later as [`AppEvent::Transcript`].
    pub fn toggle_listening(&mut self) -> Result<bool, SpeechError> {
        if self.is_listening() {
            self.stop_listening();
            return Ok(false);
        }

        if self.recognize_command.is_empty() {
            return Err(SpeechError::RecognitionUnsupported);
        }

        self.stop_speaking();

        let child = Command::new(&self.recognize_command[0])
            .args(&self.recognize_command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let events = self.events.clone();
        self.listener = Some(tokio::spawn(async move {
            let event = match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if transcript.is_empty() {
                        AppEvent::SpeechFailed("No speech detected. Please try again.".to_string())
                    } else {
                        AppEvent::Transcript(transcript)
                    }
                }
                Ok(output) => AppEvent::SpeechFailed(format!(
                    "Speech recognition error ({})",
                    output.status
                )),
                Err(e) => AppEvent::SpeechFailed(format!("Speech recognition error: {}", e)),
            };
            let _ = events.send(event);
        }));

        tracing::debug!("speech recognition started");
        Ok(true)
    }

    pub fn stop_listening(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }

    /// Stop everything (panel closed or app exiting).
    pub fn stop_all(&mut self) {
        self.stop_listening();
        self.stop_speaking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(
        synth: &[&str],
        recognize: &[&str],
    ) -> (SpeechCoordinator, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = SpeechConfig {
            enabled: true,
            synthesize_command: synth.iter().map(|s| s.to_string()).collect(),
            recognize_command: recognize.iter().map(|s| s.to_string()).collect(),
        };
        (SpeechCoordinator::new(&config, tx), rx)
    }

    #[test]
    fn markup_is_removed_before_speaking() {
        let text = "<p>Your **order** is *on its way*.</p>\n\n## Details\n\
                    See [tracking](https://t/1) or run `status`";
        assert_eq!(
            clean_text_for_speech(text),
            "Your order is on its way.. Details. See tracking or run status"
        );
    }

    #[test]
    fn blank_markup_cleans_to_empty() {
        assert_eq!(clean_text_for_speech("<br/>\n \n"), "");
    }

    #[tokio::test]
    async fn listening_without_a_command_is_unsupported() {
        let (mut speech, _rx) = coordinator(&["sleep"], &[]);
        assert!(matches!(
            speech.toggle_listening(),
            Err(SpeechError::RecognitionUnsupported)
        ));
    }

    #[tokio::test]
    async fn listening_interrupts_speaking_and_delivers_transcript() {
        let (mut speech, mut rx) = coordinator(&["sleep"], &["echo", "where is my order"]);

        speech.speak("5");
        assert_eq!(speech.activity(), SpeechActivity::Speaking);

        assert!(speech.toggle_listening().unwrap());
        assert_ne!(speech.activity(), SpeechActivity::Speaking);

        match rx.recv().await {
            Some(AppEvent::Transcript(text)) => assert_eq!(text, "where is my order"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn muting_stops_speech_and_ignores_new_text() {
        let (mut speech, _rx) = coordinator(&["sleep"], &[]);

        speech.speak("5");
        assert!(!speech.toggle_synthesis());
        assert_eq!(speech.activity(), SpeechActivity::Idle);

        speech.speak("5");
        assert_eq!(speech.activity(), SpeechActivity::Idle);
    }
}
