//! Resource loader with an explicit lifecycle.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug)]
pub struct StateContext {
    pub state: State,
    pub data: Option<String>,
    pub error: Option<String>,
}

pub struct ResourceLoader {
    context: StateContext,
}

impl ResourceLoader {
    /// Reset the loader to its starting state.
    /// @lifecycle 1
    pub fn init(&mut self) {
        self.context.state = State::Idle;
    }

    /// Begin loading.
    /// @lifecycle 2
    ///
    /// # Errors
    /// - the loader is not idle
    pub fn start(&mut self) -> Result<(), String> {
        if self.context.state != State::Idle {
            return Err("invalid state".to_string());
        }
        self.context.state = State::Loading;
        Ok(())
    }

    /// Stop and drop the payload.
    /// @lifecycle 3
    pub fn stop(&mut self) {
        self.context.state = State::Idle;
        self.context.data = None;
    }

    /// State transition: Loading -> Loaded
    pub fn on_success(&mut self, data: String) {
        self.context.state = State::Loaded;
        self.context.data = Some(data);
    }

    /// State transition: Loading -> Error
    pub fn on_error(&mut self, err: String) {
        self.context.state = State::Error;
        self.context.error = Some(err);
    }

    /// Go back to idle after a failure.
    pub fn retry(&mut self) {
        if self.context.state == State::Error {
            self.context.state = State::Idle;
            self.context.error = None;
        }
    }

    pub fn state(&self) -> State {
        self.context.state
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
