use serde::{Deserialize, Serialize};

/// Spoken phrase templates. `{name}` expands to a display name and
/// `{taken}`/`{target}` to capture progress; deployments override any of
/// these through configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub welcome: String,
    pub greeting: String,
    pub unknown_prompt: String,
    pub name_retry: String,
    pub capture_started: String,
    pub capture_progress: String,
    pub enroll_completed: String,
    pub enroll_retry: String,
    pub enroll_timeout: String,
    pub idle_checkin: String,
    pub goodbye: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            welcome: "Hello! The receptionist is ready.".into(),
            greeting: "Welcome back, {name}! Nice to see you.".into(),
            unknown_prompt: "Hi there! I don't recognize you yet. What is your name?".into(),
            name_retry: "Sorry, I didn't catch your name. Could you say it again?".into(),
            capture_started: "Thanks, {name}! Now look at the camera while I take a few pictures."
                .into(),
            capture_progress: "Picture {taken} of {target}.".into(),
            enroll_completed: "All done, {name}! I'll recognize you from now on.".into(),
            enroll_retry: "Something went wrong saving that. Let's try again.".into(),
            enroll_timeout: "We ran out of time. Please step up and try again whenever you like."
                .into(),
            idle_checkin: "I'm still here if you need anything.".into(),
            goodbye: "Goodbye! Thanks for stopping by.".into(),
        }
    }
}

impl Phrases {
    pub fn greeting_for(&self, name: &str) -> String {
        self.greeting.replace("{name}", name)
    }

    pub fn capture_started_for(&self, name: &str) -> String {
        self.capture_started.replace("{name}", name)
    }

    pub fn capture_progress_for(&self, taken: u32, target: u32) -> String {
        self.capture_progress
            .replace("{taken}", &taken.to_string())
            .replace("{target}", &target.to_string())
    }

    pub fn enroll_completed_for(&self, name: &str) -> String {
        self.enroll_completed.replace("{name}", name)
    }
}
