//! The act state machine.
//!
//! The machine is pure: given the user's stored code and a routed event it
//! returns a [`Step`] describing what to say and which code to persist. It
//! never reads or writes storage.

use questline_core::progress::{ProgressCode, StateId};
use questline_core::resolver;

use super::event::{Route, START_QUEST_CALLBACK, Trigger};
use super::output::{ChoiceOption, Output};
use super::script::{ACT_PLACEHOLDER, ActScene, QuestScript, USER_NAME_PLACEHOLDER};

/// What the machine knows about the user when stepping.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The persisted progress code.
    pub code: ProgressCode,
    /// Name to greet the user by, if the transport supplied one.
    pub display_name: Option<&'a str>,
}

/// The intent produced by one step: outputs plus the code to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The state whose handler took the event; recorded in history.
    pub handled_by: StateId,
    /// The state the conversation is in afterwards.
    pub current: StateId,
    pub outputs: Vec<Output>,
    /// `Some` when the progress code must be written.
    pub next_code: Option<ProgressCode>,
}

impl Step {
    fn stay(handled_by: StateId, current: StateId, outputs: Vec<Output>) -> Self {
        Self {
            handled_by,
            current,
            outputs,
            next_code: None,
        }
    }
}

/// State machine built once from a [`QuestScript`].
#[derive(Debug, Clone)]
pub struct ActStateMachine {
    script: QuestScript,
}

impl ActStateMachine {
    #[must_use]
    pub fn new(script: QuestScript) -> Self {
        Self { script }
    }

    #[must_use]
    pub fn script(&self) -> &QuestScript {
        &self.script
    }

    /// Handles a routed event.
    #[must_use]
    pub fn step(&self, route: &Route, ctx: &StepContext<'_>) -> Step {
        let current = resolver::resolve(ctx.code);
        let messages = &self.script.messages;
        match route {
            Route::Enter { state, trigger } => self.enter(*state, *trigger, ctx),
            Route::Input(text) => self.input(text, ctx),
            Route::Reset => Step {
                handled_by: current,
                current: StateId::Start,
                outputs: vec![Output::text(&messages.reset)],
                next_code: Some(ProgressCode::Default),
            },
            Route::Help => Step::stay(current, current, vec![Output::reply(&messages.help)]),
            Route::About => Step::stay(current, current, vec![Output::reply(&messages.about)]),
            Route::Unknown => Step::stay(
                current,
                current,
                vec![Output::reply(&messages.unknown_command)],
            ),
        }
    }

    /// Runs the entry action of `state`.
    #[must_use]
    pub fn enter(&self, state: StateId, trigger: Trigger, ctx: &StepContext<'_>) -> Step {
        match state {
            StateId::PreCheck => {
                let target = resolver::resolve(ctx.code);
                let mut step = self.enter(target, trigger, ctx);
                step.handled_by = StateId::PreCheck;
                step
            }
            StateId::Start => self.enter_start(ctx),
            StateId::Info => self.enter_info(ctx),
            StateId::FirstAct
            | StateId::SecondAct
            | StateId::ThirdAct
            | StateId::Final
            | StateId::Present => self.enter_scene(state, trigger, ctx),
        }
    }

    /// Handles free text in the user's current state.
    #[must_use]
    pub fn input(&self, text: &str, ctx: &StepContext<'_>) -> Step {
        let current = resolver::resolve(ctx.code);
        let messages = &self.script.messages;

        if current.is_terminal() {
            return Step::stay(current, current, vec![Output::reply(&messages.quest_complete)]);
        }
        let Some(scene) = self.script.act(current) else {
            return Step::stay(current, current, vec![Output::reply(&messages.unrecognized)]);
        };

        if let Some(detour) = scene
            .detours
            .iter()
            .find(|detour| detour.keywords.iter().any(|k| k == text))
        {
            let output = if detour.as_reply {
                Output::reply(&detour.reply)
            } else {
                Output::text(&detour.reply)
            };
            return Step::stay(current, current, vec![output]);
        }

        if scene.secrets.iter().any(|secret| secret == text) {
            return self.advance(current, scene);
        }

        if text == self.script.keywords.hint {
            return Step::stay(
                current,
                current,
                vec![
                    Output::reply(&scene.hint),
                    Output::illustration(&scene.illustration),
                ],
            );
        }

        Step::stay(current, current, vec![Output::reply(&messages.unrecognized)])
    }

    /// Message sent when the engine could not load the user's record.
    #[must_use]
    pub fn data_error(&self) -> Output {
        Output::text(&self.script.messages.data_error)
    }

    /// Generic message for backend failures.
    #[must_use]
    pub fn generic_failure(&self) -> Output {
        Output::text(&self.script.messages.generic_failure)
    }

    fn advance(&self, from: StateId, scene: &ActScene) -> Step {
        let Some(next) = resolver::successor(from) else {
            return Step::stay(from, from, Vec::new());
        };
        let mut outputs = vec![Output::reply(&scene.confirmation)];
        outputs.extend(self.scene_content(next, Trigger::Message));
        Step {
            handled_by: from,
            current: next,
            outputs,
            next_code: resolver::code_for(next),
        }
    }

    fn enter_start(&self, ctx: &StepContext<'_>) -> Step {
        let messages = &self.script.messages;
        match ctx.code {
            ProgressCode::Default => {
                let name = ctx
                    .display_name
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(messages.unknown_user_name.as_str());
                let greeting = messages.greeting.replace(USER_NAME_PLACEHOLDER, name);
                let choice = ChoiceOption::new(&messages.affirmative_label, START_QUEST_CALLBACK);
                Step::stay(
                    StateId::Start,
                    StateId::Start,
                    vec![Output::choice(greeting, vec![choice])],
                )
            }
            ProgressCode::Present => Step::stay(
                StateId::Start,
                StateId::Present,
                vec![Output::text(&messages.win)],
            ),
            code => {
                let target = resolver::resolve(code);
                let mut outputs = vec![self.already_active(target)];
                outputs.extend(self.scene_content(target, Trigger::Message));
                Step::stay(StateId::Start, target, outputs)
            }
        }
    }

    fn enter_info(&self, ctx: &StepContext<'_>) -> Step {
        let messages = &self.script.messages;
        if ctx.code.is_default() {
            let choice =
                ChoiceOption::new(&messages.activate_label, StateId::FirstAct.label());
            return Step::stay(
                StateId::Info,
                StateId::Info,
                vec![Output::choice(&messages.info, vec![choice]).after(self.script.pacing.info_ms)],
            );
        }
        let current = resolver::resolve(ctx.code);
        Step::stay(StateId::Info, current, vec![self.already_active(current)])
    }

    fn enter_scene(&self, state: StateId, trigger: Trigger, ctx: &StepContext<'_>) -> Step {
        let current = resolver::resolve(ctx.code);

        if state == StateId::FirstAct && ctx.code.is_default() {
            return Step {
                handled_by: state,
                current: state,
                outputs: self.scene_content(state, trigger),
                next_code: Some(ProgressCode::FirstAct),
            };
        }
        if state == current {
            return Step::stay(state, state, self.scene_content(state, trigger));
        }
        if current == StateId::Start {
            let reply = Output::reply(&self.script.messages.unknown_command);
            return Step::stay(state, current, vec![reply]);
        }
        Step::stay(state, current, vec![self.already_active(current)])
    }

    /// Narrative emitted when a scene is entered.
    fn scene_content(&self, state: StateId, trigger: Trigger) -> Vec<Output> {
        if state.is_terminal() {
            let present = &self.script.present;
            return vec![Output::text(&present.body).after(present.delay_ms)];
        }
        let Some(scene) = self.script.act(state) else {
            return Vec::new();
        };
        let line_ms = self.script.pacing.line_ms;
        match trigger {
            Trigger::Message => vec![
                Output::text(&scene.title).after(scene.intro_delay_ms),
                Output::text(&scene.body).after(line_ms),
            ],
            Trigger::Callback => vec![
                Output::callback_ack(&scene.title),
                Output::text(&scene.title),
                Output::text(&scene.body).after(line_ms),
            ],
        }
    }

    /// Notice for a user who pressed a stale button or re-greeted mid-quest.
    fn already_active(&self, current: StateId) -> Output {
        let messages = &self.script.messages;
        let title = resolver::code_for(current)
            .filter(|code| !code.is_default())
            .map(resolver::resolve)
            .and_then(|state| self.script.title(state));
        match title {
            Some(title) => Output::text(messages.already_active.replace(ACT_PLACEHOLDER, title)),
            None => Output::text(&messages.already_active_unnamed),
        }
    }
}
