//! Turn state machine
//!
//! ```text
//! Init → Selecting → Generating ⇄ ToolCall
//!                        │           │
//!                        └→ Finishing ←┘ → Closed
//! any non-terminal phase → Errored → Closed
//! ```

use crate::types::{ChatMessage, ToolChoice, Usage};

/// Where a turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Init,
    Selecting,
    Generating,
    ToolCall,
    Finishing,
    Errored,
    Closed,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        self == TurnPhase::Closed
    }

    /// Whether `self → next` is an edge of the machine
    pub fn can_transition(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (Init, Selecting)
            | (Selecting, Generating)
            | (Generating, ToolCall)
            | (ToolCall, Generating)
            | (Generating, Finishing)
            | (ToolCall, Finishing)
            | (Finishing, Closed)
            | (Errored, Closed) => true,
            (Closed, _) | (Errored, _) => false,
            (_, Errored) => true,
            _ => false,
        }
    }
}

/// Transient per-turn state
#[derive(Debug, Clone)]
pub struct TurnState {
    pub phase: TurnPhase,
    pub step_count: u32,
    pub max_steps: u32,
    pub tool_choice: ToolChoice,
    /// Messages produced this turn, tool calls included
    pub accumulated: Vec<ChatMessage>,
    pub usage: Usage,
    /// History was already summarized once this turn
    pub summarized: bool,
}

impl TurnState {
    pub fn new(max_steps: u32) -> Self {
        Self {
            phase: TurnPhase::Init,
            step_count: 0,
            max_steps: max_steps.max(1),
            tool_choice: ToolChoice::Auto,
            accumulated: Vec::new(),
            usage: Usage::default(),
            summarized: false,
        }
    }

    /// Move to `next`; invalid edges leave the phase unchanged
    pub fn advance(&mut self, next: TurnPhase) -> bool {
        if self.phase == next {
            return true;
        }
        let ok = self.phase.can_transition(next);
        if ok {
            self.phase = next;
        }
        ok
    }

    /// Record a finished generation step; returns the new step count
    pub fn complete_step(&mut self, usage: Usage) -> u32 {
        self.step_count += 1;
        self.usage = self.usage.add(usage);
        self.step_count
    }

    pub fn bound_reached(&self) -> bool {
        self.step_count >= self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = TurnState::new(3);
        for next in [
            TurnPhase::Selecting,
            TurnPhase::Generating,
            TurnPhase::ToolCall,
            TurnPhase::Generating,
            TurnPhase::Finishing,
            TurnPhase::Closed,
        ] {
            assert!(state.advance(next), "{:?} -> {:?}", state.phase, next);
        }
        assert!(state.phase.is_terminal());
        assert!(!state.advance(TurnPhase::Errored));
    }

    #[test]
    fn test_errored_reachable_from_non_terminal_phases() {
        for phase in [
            TurnPhase::Init,
            TurnPhase::Selecting,
            TurnPhase::Generating,
            TurnPhase::ToolCall,
            TurnPhase::Finishing,
        ] {
            assert!(phase.can_transition(TurnPhase::Errored));
        }
        assert!(TurnPhase::Errored.can_transition(TurnPhase::Closed));
        assert!(!TurnPhase::Errored.can_transition(TurnPhase::Finishing));
        assert!(!TurnPhase::Init.can_transition(TurnPhase::Generating));
    }

    #[test]
    fn test_step_accounting() {
        let mut state = TurnState::new(2);
        let usage = Usage {
            prompt_tokens: Some(5),
            completion_tokens: None,
        };
        assert_eq!(state.complete_step(usage), 1);
        assert!(!state.bound_reached());
        state.complete_step(Usage { prompt_tokens: Some(1), completion_tokens: Some(2) });
        assert!(state.bound_reached());
        assert_eq!(state.usage.prompt_tokens, Some(6));
        assert_eq!(state.usage.completion_tokens, Some(2));

        assert_eq!(TurnState::new(0).max_steps, 1);
    }
}
