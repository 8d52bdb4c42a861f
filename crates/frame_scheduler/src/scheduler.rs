#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerConfig {
    /// Frames a pending tree may wait on required tiles before the wait is
    /// reported as stalled.
    pub max_frames_waiting_for_activation: u32,
}

impl Default for FrameSchedulerConfig {
    fn default() -> Self {
        Self {
            max_frames_waiting_for_activation: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerInput {
    pub frame_sequence_id: u64,
    pub has_pending_tree: bool,
    /// A commit arrived and its tilings have not been managed yet.
    pub pending_tree_needs_update: bool,
    pub required_tiles_ready: bool,
    pub needs_redraw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    ManageTiles,
    Activate,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerUpdateReason {
    CommitReceived,
    WaitingForRequiredTiles,
    ActivationStalled,
    Activated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerDecision {
    pub frame_sequence_id: u64,
    pub manage_tiles: bool,
    pub activate: bool,
    pub draw: bool,
    pub update_reason: Option<SchedulerUpdateReason>,
}

impl FrameSchedulerDecision {
    /// The decided actions in the order they have to run.
    pub fn actions(&self) -> impl Iterator<Item = SchedulerAction> + use<> {
        [
            (self.manage_tiles, SchedulerAction::ManageTiles),
            (self.activate, SchedulerAction::Activate),
            (self.draw, SchedulerAction::Draw),
        ]
        .into_iter()
        .filter_map(|(decided, action)| decided.then_some(action))
    }
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    config: FrameSchedulerConfig,
    frames_waiting_for_activation: u32,
}

impl FrameScheduler {
    pub fn new(config: FrameSchedulerConfig) -> Self {
        Self {
            config,
            frames_waiting_for_activation: 0,
        }
    }

    pub fn config(&self) -> FrameSchedulerConfig {
        self.config
    }

    pub fn is_waiting_for_activation(&self) -> bool {
        self.frames_waiting_for_activation > 0
    }

    pub fn frames_waiting_for_activation(&self) -> u32 {
        self.frames_waiting_for_activation
    }

    pub fn schedule_frame(&mut self, input: FrameSchedulerInput) -> FrameSchedulerDecision {
        let limit = self.config.max_frames_waiting_for_activation;
        if limit == 0 {
            panic!(
                "invalid frame scheduler config: max_frames_waiting_for_activation must be at least one"
            );
        }

        if !input.has_pending_tree {
            self.frames_waiting_for_activation = 0;
            return FrameSchedulerDecision {
                frame_sequence_id: input.frame_sequence_id,
                manage_tiles: false,
                activate: false,
                draw: input.needs_redraw,
                update_reason: None,
            };
        }

        // Readiness reported alongside a fresh commit predates its required
        // tiles, so activation waits for the next frame.
        if input.pending_tree_needs_update {
            self.frames_waiting_for_activation = 0;
            return FrameSchedulerDecision {
                frame_sequence_id: input.frame_sequence_id,
                manage_tiles: true,
                activate: false,
                draw: input.needs_redraw,
                update_reason: Some(SchedulerUpdateReason::CommitReceived),
            };
        }

        if input.required_tiles_ready {
            self.frames_waiting_for_activation = 0;
            return FrameSchedulerDecision {
                frame_sequence_id: input.frame_sequence_id,
                manage_tiles: false,
                activate: true,
                draw: true,
                update_reason: Some(SchedulerUpdateReason::Activated),
            };
        }

        self.frames_waiting_for_activation = self.frames_waiting_for_activation.saturating_add(1);
        let update_reason = if self.frames_waiting_for_activation == limit + 1 {
            log::warn!("[host] pending tree waited {limit} frames for required tiles");
            Some(SchedulerUpdateReason::ActivationStalled)
        } else if self.frames_waiting_for_activation == 1 {
            Some(SchedulerUpdateReason::WaitingForRequiredTiles)
        } else {
            None
        };
        FrameSchedulerDecision {
            frame_sequence_id: input.frame_sequence_id,
            manage_tiles: false,
            activate: false,
            draw: input.needs_redraw,
            update_reason,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(FrameSchedulerConfig::default())
    }
}
