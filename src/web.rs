use gloo_net::http::Request;
use leptos::{html, *};
use tracing_subscriber::EnvFilter;
use wasm_bindgen::JsValue;

use crate::logging::{self, ConsoleSink};
use crate::report::{ReportError, ResultDispatcher, ResultReport, log_outcome};
use crate::screen::{
    AudioPlayback, LeftItem, MatchingScreen, OptionState, QuestionScreen, RightItem, Screen,
};
use crate::stage::{AudioSample, StageKind};
use crate::store::{KeyValueStore, MemoryStore, StoreError};
use crate::{Catalog, CompletionGate, MissionConfig, MissionController, Phase};

type WebController = MissionController<BrowserStore, HttpDispatcher>;

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn js_error(value: JsValue) -> StoreError {
    StoreError::Unavailable {
        reason: value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    }
}

/// `window.localStorage`, or an in-memory map when the browser refuses it.
pub enum BrowserStore {
    Local(web_sys::Storage),
    Memory(MemoryStore),
}

impl BrowserStore {
    pub fn open() -> Self {
        match leptos::window().local_storage() {
            Ok(Some(storage)) => Self::Local(storage),
            Ok(None) => {
                tracing::warn!("localStorage is disabled; completion will not persist");
                Self::Memory(MemoryStore::new())
            }
            Err(error) => {
                tracing::warn!(error = %js_error(error), "localStorage is not accessible");
                Self::Memory(MemoryStore::new())
            }
        }
    }
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Local(storage) => storage.get_item(key).map_err(js_error),
            Self::Memory(store) => store.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Self::Local(storage) => storage.set_item(key, value).map_err(js_error),
            Self::Memory(store) => store.set(key, value),
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Local(storage) => storage.remove_item(key).map_err(js_error),
            Self::Memory(store) => store.remove(key),
        }
    }
}

/// POSTs the report as JSON from a detached local task.
pub struct HttpDispatcher {
    endpoint: String,
}

impl HttpDispatcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

async fn submit(endpoint: &str, report: &ResultReport) -> Result<(), ReportError> {
    let response = Request::post(endpoint)
        .json(report)
        .map_err(|error| ReportError::Encode(error.to_string()))?
        .send()
        .await
        .map_err(|error| ReportError::Network(error.to_string()))?;

    if response.ok() {
        Ok(())
    } else {
        Err(ReportError::Status(response.status()))
    }
}

impl ResultDispatcher for HttpDispatcher {
    fn dispatch(&self, report: ResultReport) {
        let endpoint = self.endpoint.clone();
        spawn_local(async move {
            let outcome = submit(&endpoint, &report).await;
            log_outcome(&report, &outcome);
        });
    }
}

/// Which screen component is mounted. Changes only on navigation so that
/// inputs and audio players survive answer updates.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ScreenKey {
    Notice,
    Welcome,
    NameForm,
    Stage(usize),
    Completion,
}

fn screen_key(controller: &WebController) -> ScreenKey {
    match controller.phase() {
        Phase::Completed => ScreenKey::Completion,
        _ if controller.is_locked() => ScreenKey::Notice,
        Phase::Welcome => ScreenKey::Welcome,
        Phase::NamePrompt => ScreenKey::NameForm,
        Phase::InStage(index) => ScreenKey::Stage(index),
    }
}

fn act<F>(controller: RwSignal<WebController>, action: F)
where
    F: FnOnce(&mut WebController) -> Result<(), crate::ProgressError>,
{
    controller.update(|controller| {
        if let Err(error) = action(controller) {
            tracing::debug!(%error, "action rejected");
        }
    });
}

#[component]
fn NoticeScreen(controller: RwSignal<WebController>) -> impl IntoView {
    let reset = move |_| {
        controller.update(|controller| {
            if let Err(error) = controller.reset_restriction() {
                tracing::warn!(%error, "restriction could not be cleared");
            }
        })
    };

    view! {
        <section class="card notice-card">
            <h1 class="headline">"Mission already completed"</h1>
            <p class="lede">
                "You have already completed this mission on this device. A second run would not be recorded."
            </p>
            <button class="btn btn-ghost dev-reset" type="button" on:click=reset>
                "Reset restriction (developer)"
            </button>
        </section>
    }
}

#[component]
fn WelcomeScreen(stage_count: usize, controller: RwSignal<WebController>) -> impl IntoView {
    view! {
        <section class="card welcome-card">
            <h1 class="headline">"Operation \"Agent 7-B\""</h1>
            <p class="lede">
                {format!(
                    "Secret assignment: communication between agents is down. Only you can restore it by passing {stage_count} trials on signal level measurement. Every question is a step towards the answer."
                )}
            </p>
            <ul class="mission-list">
                <li>{format!("Pass {stage_count} trials")}</li>
                <li>"Solve signal measurement problems"</li>
                <li>"Become a top-class agent"</li>
            </ul>
            <button
                class="btn btn-primary"
                type="button"
                on:click=move |_| act(controller, |controller| controller.open_name_prompt())
            >
                "Start mission"
            </button>
        </section>
    }
}

#[component]
fn NameFormScreen(controller: RwSignal<WebController>) -> impl IntoView {
    let (first_name, set_first_name) = create_signal(String::new());
    let (last_name, set_last_name) = create_signal(String::new());
    let can_start =
        move || !first_name.get().trim().is_empty() && !last_name.get().trim().is_empty();

    let on_submit = move |event: ev::SubmitEvent| {
        event.prevent_default();
        let (first, last) = (first_name.get_untracked(), last_name.get_untracked());
        act(controller, move |controller| {
            controller.set_first_name(&first)?;
            controller.set_last_name(&last)?;
            controller.start(now_ms())
        });
    };

    view! {
        <section class="card name-card">
            <h2 class="headline">"Agent identification"</h2>
            <p class="lede">"Introduce yourself, agent. Enter your first and last name to access the assignment."</p>
            <form class="name-form" on:submit=on_submit>
                <label class="label">
                    "First name *"
                    <input
                        type="text"
                        placeholder="First name"
                        required=true
                        prop:value=move || first_name.get()
                        on:input=move |event| set_first_name.set(event_target_value(&event))
                    />
                </label>
                <label class="label">
                    "Last name *"
                    <input
                        type="text"
                        placeholder="Last name"
                        required=true
                        prop:value=move || last_name.get()
                        on:input=move |event| set_last_name.set(event_target_value(&event))
                    />
                </label>
                <button class="btn btn-primary" type="submit" disabled=move || !can_start()>
                    "Start mission"
                </button>
            </form>
        </section>
    }
}

#[component]
fn StageHeaderView(header: crate::screen::StageHeader) -> impl IntoView {
    let image = header
        .image
        .clone()
        .map(|(url, alt)| view! { <img class="stage-image" src=url alt=alt /> });

    view! {
        <header class="stage-header">
            <div>
                <p class="label">{format!("Agent {}", header.agent_name)}</p>
                <p class="value">{format!("Stage {} of {}", header.number, header.total)}</p>
            </div>
            <div class="pill">{format!("{}% complete", header.progress_percent)}</div>
        </header>
        <div class="progress-track">
            <div class="progress-bar" style=format!("width: {}%", header.progress_percent)></div>
        </div>
        <h2 class="headline">{header.title.clone()}</h2>
        <p class="stage-description">{header.description.clone()}</p>
        {image}
        <div class="prompt-area">
            <p class="prompt">{header.question.clone()}</p>
        </div>
    }
}

/// One recording. Starting it stops and rewinds whichever sample was
/// running before.
#[component]
fn AudioSampleButton(sample: AudioSample, playback: RwSignal<AudioPlayback>) -> impl IntoView {
    let audio_ref = create_node_ref::<html::Audio>();
    let volume = f64::from(sample.volume);
    let label = sample.label.clone();

    create_effect(move |_| {
        if let Some(audio) = audio_ref.get() {
            audio.set_volume(volume);
        }
    });

    let own_label = label.clone();
    create_effect(move |_| {
        if !playback.with(|playback| playback.should_stop(&own_label)) {
            return;
        }
        if let Some(audio) = audio_ref.get_untracked() {
            if !audio.paused() {
                if let Err(error) = audio.pause() {
                    tracing::debug!(error = ?error, "sample could not be paused");
                }
            }
            audio.set_current_time(0.0);
        }
    });

    let on_play = move |_| {
        playback.update(|playback| {
            playback.start(&label);
        })
    };
    let on_ended = {
        let label = sample.label.clone();
        move |_| playback.update(|playback| playback.finish(&label))
    };

    view! {
        <div class="audio-sample">
            <span class="option-index">{format!("Recording {}", sample.label)}</span>
            <audio
                node_ref=audio_ref
                src=sample.url.clone()
                preload="auto"
                controls=true
                on:play=on_play
                on:ended=on_ended
            ></audio>
        </div>
    }
}

#[component]
fn FeedbackPanel(feedback: Signal<Option<crate::screen::Feedback>>) -> impl IntoView {
    move || {
        feedback.get().map(|feedback| {
            let (class, heading) = if feedback.correct {
                ("feedback correct", "Correct!")
            } else {
                ("feedback wrong", "Incorrect!")
            };
            view! {
                <div class=class role="status">
                    <p class="feedback-heading">{heading}</p>
                    <p class="feedback-body">{feedback.message}</p>
                </div>
            }
        })
    }
}

#[component]
fn NextButton(
    controller: RwSignal<WebController>,
    visible: Signal<bool>,
    is_last: bool,
) -> impl IntoView {
    let label = if is_last {
        "Complete mission"
    } else {
        "Next trial →"
    };

    move || {
        visible.get().then(|| {
            view! {
                <button
                    class="btn btn-primary next"
                    type="button"
                    on:click=move |_| act(controller, |controller| controller.advance(now_ms()).map(|_| ()))
                >
                    {label}
                </button>
            }
        })
    }
}

#[component]
fn QuestionCard(controller: RwSignal<WebController>, initial: QuestionScreen) -> impl IntoView {
    let current = create_memo(move |_| {
        controller.with(|controller| match Screen::of(controller) {
            Screen::Question(question) => Some(question),
            _ => None,
        })
    });
    let stage_index = initial.header.stage_index;

    let options = move || {
        current.get().map(|question| {
            let enabled = question.options_enabled;
            question
                .options
                .into_iter()
                .map(|option| {
                    let status = match option.state {
                        OptionState::Idle => "option",
                        OptionState::SelectedCorrect => "option correct",
                        OptionState::SelectedWrong => "option wrong",
                    };
                    let index = option.index;

                    view! {
                        <button
                            class=status
                            type="button"
                            disabled={!enabled}
                            aria-pressed={(option.state != OptionState::Idle).to_string()}
                            on:click=move |_| {
                                act(controller, |controller| {
                                    controller.select_option(stage_index, index).map(|_| ())
                                })
                            }
                        >
                            <span class="option-index">{(index + 1).to_string()}</span>
                            <span class="option-body">{option.text}</span>
                        </button>
                    }
                })
                .collect_view()
        })
    };

    let playback = create_rw_signal(AudioPlayback::default());
    let audio = (initial.kind == StageKind::AudioChoice).then(|| {
        view! {
            <div class="audio-samples">
                <p class="prompt-heading">"Listen to the recordings:"</p>
                {initial
                    .audio
                    .iter()
                    .cloned()
                    .map(|sample| view! { <AudioSampleButton sample=sample playback=playback /> })
                    .collect_view()}
            </div>
        }
    });

    let feedback = Signal::derive(move || current.get().and_then(|question| question.feedback));
    let can_advance = Signal::derive(move || current.get().is_some_and(|question| question.can_advance));

    view! {
        <section class="card quiz-card">
            <StageHeaderView header=initial.header.clone() />
            {audio}
            <div class="options-grid">{options}</div>
            <FeedbackPanel feedback=feedback />
            <NextButton controller=controller visible=can_advance is_last=initial.header.is_last />
        </section>
    }
}

#[component]
fn MatchingCard(controller: RwSignal<WebController>, initial: MatchingScreen) -> impl IntoView {
    let current = create_memo(move |_| {
        controller.with(|controller| match Screen::of(controller) {
            Screen::Matching(board) => Some(board),
            _ => None,
        })
    });
    let stage_index = initial.header.stage_index;

    let left_column = move || {
        current.get().map(|board| {
            let editable = board.editable;
            board
                .left
                .into_iter()
                .map(|LeftItem { text, matched_with, selected }| {
                    let class = if selected {
                        "match-item selected"
                    } else if matched_with.is_some() {
                        "match-item matched"
                    } else {
                        "match-item"
                    };
                    let pick = text.clone();
                    let remove = text.clone();
                    let unmatch_button = matched_with.clone().map(|right| {
                        view! {
                            <button
                                class="unmatch"
                                type="button"
                                disabled={!editable}
                                aria-label={format!("Remove pair with {right}")}
                                on:click=move |_| {
                                    let remove = remove.clone();
                                    act(controller, move |controller| controller.unmatch(&remove))
                                }
                            >
                                "×"
                            </button>
                        }
                    });

                    view! {
                        <div class="match-row">
                            <button
                                class=class
                                type="button"
                                disabled={!editable}
                                on:click=move |_| {
                                    let pick = pick.clone();
                                    act(controller, move |controller| controller.pick_left(&pick))
                                }
                            >
                                {text}
                                {matched_with.map(|right| format!(" → {right}"))}
                            </button>
                            {unmatch_button}
                        </div>
                    }
                })
                .collect_view()
        })
    };

    let right_column = move || {
        current.get().map(|board| {
            let editable = board.editable;
            let has_left_selection = board.has_left_selection;
            board
                .right
                .into_iter()
                .map(|RightItem { text, used }| {
                    let class = if used { "match-item used" } else { "match-item" };
                    let pick = text.clone();

                    view! {
                        <button
                            class=class
                            type="button"
                            disabled={!editable || !has_left_selection || used}
                            on:click=move |_| {
                                let pick = pick.clone();
                                act(controller, move |controller| controller.pick_right(&pick))
                            }
                        >
                            {text}
                        </button>
                    }
                })
                .collect_view()
        })
    };

    let submit = move || {
        current.get().filter(|board| board.editable).map(|board| {
            view! {
                <button
                    class="btn btn-primary"
                    type="button"
                    disabled={!board.can_submit}
                    on:click=move |_| {
                        act(controller, |controller| {
                            controller.submit_matching(stage_index).map(|_| ())
                        })
                    }
                >
                    "Check"
                </button>
            }
        })
    };

    let feedback = Signal::derive(move || current.get().and_then(|board| board.feedback));
    let can_advance = Signal::derive(move || current.get().is_some_and(|board| board.can_advance));

    view! {
        <section class="card quiz-card matching-card">
            <StageHeaderView header=initial.header.clone() />
            <div class="matching-grid">
                <div class="match-column">
                    <p class="prompt-heading">"Instrument"</p>
                    {left_column}
                </div>
                <div class="match-column">
                    <p class="prompt-heading">"Measures"</p>
                    {right_column}
                </div>
            </div>
            <div class="actions">{submit}</div>
            <FeedbackPanel feedback=feedback />
            <NextButton controller=controller visible=can_advance is_last=initial.header.is_last />
        </section>
    }
}

#[component]
fn CompletionScreen(
    controller: RwSignal<WebController>,
    summary: crate::CompletionSummary,
) -> impl IntoView {
    view! {
        <section class="card completion-card">
            <h1 class="headline">"Mission accomplished!"</h1>
            <p class="lede">
                {format!(
                    "Outstanding, {} {}! You measured the signal level, stabilised the amplifier and cleared the spectrum. The link is restored!",
                    summary.first_name, summary.last_name
                )}
            </p>
            <div class="status-panel">
                <div class="status-item">
                    <p class="label">"Your result"</p>
                    <p class="score">{format!("{}%", summary.score)}</p>
                </div>
                <div class="status-item">
                    <p class="label">"Correct on the first attempt"</p>
                    <p class="value">
                        {format!("{} of {}", summary.correct_first_attempts, summary.total_questions)}
                    </p>
                </div>
                <div class="status-item">
                    <p class="value">{summary.verdict.headline()}</p>
                </div>
            </div>
            <button
                class="btn"
                type="button"
                on:click=move |_| controller.update(|controller| controller.restart())
            >
                "Back to start"
            </button>
        </section>
    }
}

#[component]
fn App(controller: RwSignal<WebController>) -> impl IntoView {
    let key = create_memo(move |_| controller.with(screen_key));

    view! {
        <main class="page">
            {move || {
                let _ = key.get();
                match controller.with_untracked(|controller| Screen::of(controller)) {
                    Screen::AlreadyCompleted => view! { <NoticeScreen controller=controller /> }.into_view(),
                    Screen::Welcome { stage_count } => {
                        view! { <WelcomeScreen stage_count=stage_count controller=controller /> }.into_view()
                    }
                    Screen::NameForm(_) => view! { <NameFormScreen controller=controller /> }.into_view(),
                    Screen::Question(question) => {
                        view! { <QuestionCard controller=controller initial=question /> }.into_view()
                    }
                    Screen::Matching(board) => {
                        view! { <MatchingCard controller=controller initial=board /> }.into_view()
                    }
                    Screen::Completion(summary) => {
                        view! { <CompletionScreen controller=controller summary=summary /> }.into_view()
                    }
                }
            }}
        </main>
    }
}

/// Builds the controller from the compiled-in catalog and mounts the app.
pub fn mount() {
    console_error_panic_hook::set_once();
    logging::init(ConsoleSink, EnvFilter::new("info"));

    let config = MissionConfig::default();
    let catalog = match Catalog::builtin() {
        Ok(catalog) => catalog,
        Err(error) => {
            tracing::error!(%error, "stage catalog is invalid");
            let message = error.to_string();
            mount_to_body(move || {
                view! {
                    <section class="error-card">
                        <p class="eyebrow">"Catalog error"</p>
                        <p class="error-body">{message}</p>
                    </section>
                }
            });
            return;
        }
    };

    let controller = MissionController::new(
        catalog,
        CompletionGate::new(BrowserStore::open(), config.completion_key.clone()),
        HttpDispatcher::new(config.collector_url.clone()),
    );

    mount_to_body(move || {
        let controller = create_rw_signal(controller);
        view! { <App controller=controller /> }
    });
}
