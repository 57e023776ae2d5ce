//! Chat Page

use std::time::Duration;

use chrono::{DateTime, Utc};
use leptos::prelude::*;

use crate::api::{self, AgentStep, ApiResult, SessionView};
use crate::components::{ApiKeySection, MessageBubble, Toast};

const TOAST_DURATION: Duration = Duration::from_secs(3);

const INVALID_KEY: &str = "Please enter a valid Google API key.";
const INVALID_KEY_UPDATE: &str = "Please enter a valid Google API key to update.";

/// Toast after a key is stored
fn key_saved_toast(was_set: bool) -> &'static str {
    if was_set { "API key updated!" } else { "API key saved!" }
}

/// Validation message for an empty key field
fn key_error(was_set: bool) -> &'static str {
    if was_set { INVALID_KEY_UPDATE } else { INVALID_KEY }
}

#[component]
pub fn ChatPage() -> impl IntoView {
    let (session, set_session) = signal(None::<SessionView>);
    let (models, set_models) = signal(Vec::<String>::new());
    let (input, set_input) = signal(String::new());
    let (pending, set_pending) = signal(None::<String>);
    let (loading, set_loading) = signal(false);
    let (key_error, set_key_error) = signal(None::<String>);
    let (toast, set_toast) = signal(None::<String>);
    let (load_error, set_load_error) = signal(None::<String>);
    // Agent steps of replies made in this tab, keyed by reply timestamp
    let (steps, set_steps) = signal(Vec::<(DateTime<Utc>, Vec<AgentStep>)>::new());

    leptos::task::spawn_local(async move {
        if let Ok(list) = api::list_models().await {
            set_models.set(list.models);
        }
        match api::resume_or_create().await {
            Ok(view) => set_session.set(Some(view)),
            Err(e) => set_load_error.set(Some(e.message)),
        }
    });

    let notify = move |text: &str| {
        set_toast.set(Some(text.to_string()));
        set_timeout(move || set_toast.set(None), TOAST_DURATION);
    };

    // Store the new view; on failure keep the old one and surface the message
    let apply = move |result: ApiResult<SessionView>, success: Option<&'static str>| match result {
        Ok(view) => {
            set_session.set(Some(view));
            if let Some(text) = success {
                notify(text);
            }
        }
        Err(e) => notify(&e.message),
    };

    let session_id = move || session.with_untracked(|s| s.as_ref().map(|s| s.id.clone()));
    let key_set = Signal::derive(move || session.with(|s| s.as_ref().is_some_and(|s| s.api_key_set)));
    let enabled = move || session.with(|s| s.as_ref().is_some_and(|s| s.input_enabled));
    let model = move || session.with(|s| s.as_ref().map(|s| s.model.clone()).unwrap_or_default());

    let save_key = Callback::new(move |key: String| {
        let was_set = key_set.get_untracked();
        if key.trim().is_empty() {
            set_key_error.set(Some(self::key_error(was_set).into()));
            return;
        }
        set_key_error.set(None);
        let Some(id) = session_id() else { return };
        leptos::task::spawn_local(async move {
            let result = api::put_api_key(&id, &key).await;
            if let Err(e) = &result {
                set_key_error.set(Some(e.message.clone()));
            }
            apply(result, Some(key_saved_toast(was_set)));
        });
    });

    let clear_key = Callback::new(move |()| {
        let Some(id) = session_id() else { return };
        leptos::task::spawn_local(async move {
            apply(api::delete_api_key(&id).await, Some("API key cleared!"));
        });
    });

    let pick_model = move |choice: String| {
        let Some(id) = session_id() else { return };
        leptos::task::spawn_local(async move {
            apply(api::update_settings(&id, Some(choice), None).await, None);
        });
    };

    let set_temperature = move |raw: String| {
        let Ok(value) = raw.parse::<f32>() else { return };
        let Some(id) = session_id() else { return };
        leptos::task::spawn_local(async move {
            apply(api::update_settings(&id, None, Some(value)).await, None);
        });
    };

    let clear_chat = move |_| {
        let Some(id) = session_id() else { return };
        leptos::task::spawn_local(async move {
            let result = api::clear_history(&id).await;
            if result.is_ok() {
                set_steps.set(Vec::new());
            }
            apply(result, Some("Chat history cleared!"));
        });
    };

    let send = move || {
        let msg = input.get_untracked();
        if msg.trim().is_empty() || loading.get_untracked() || !enabled() {
            return;
        }
        let Some(id) = session_id() else { return };

        set_input.set(String::new());
        set_pending.set(Some(msg.clone()));
        set_loading.set(true);

        leptos::task::spawn_local(async move {
            match api::send_chat(&id, &msg).await {
                Ok(reply) => {
                    if let Some(error) = reply.error {
                        notify(&error);
                    }
                    let answered_at = reply.session.transcript.last().map(|m| m.timestamp);
                    if let (Some(at), false) = (answered_at, reply.steps.is_empty()) {
                        set_steps.update(|all| all.push((at, reply.steps)));
                    }
                    set_session.set(Some(reply.session));
                }
                Err(e) => notify(&e.message),
            }
            set_pending.set(None);
            set_loading.set(false);
        });
    };

    view! {
        <div class="chat">
            <aside class="sidebar">
                <h2>"⚙️ Configuration"</h2>

                <ApiKeySection key_set=key_set error=key_error on_submit=save_key on_clear=clear_key />

                <section class="field">
                    <h3>"Model Selection"</h3>
                    <For
                        each=move || models.get()
                        key=|m| m.clone()
                        children=move |m| {
                            let value = m.clone();
                            let checked = {
                                let m = m.clone();
                                move || model() == m
                            };
                            view! {
                                <label class="radio">
                                    <input
                                        type="radio"
                                        name="model"
                                        prop:checked=checked
                                        disabled=move || !enabled()
                                        on:change=move |_| pick_model(value.clone())
                                    />
                                    {m}
                                </label>
                            }
                        }
                    />
                </section>

                <section class="field">
                    <h3>"Model Temperature"</h3>
                    <input
                        type="range"
                        min="0"
                        max="1"
                        step="0.1"
                        prop:value=move || {
                            session.with(|s| s.as_ref().map_or(0.7, |s| s.temperature)).to_string()
                        }
                        disabled=move || !enabled()
                        on:change=move |ev| set_temperature(event_target_value(&ev))
                    />
                    <span class="value">
                        {move || format!("{:.1}", session.with(|s| s.as_ref().map_or(0.7, |s| s.temperature)))}
                    </span>
                </section>

                <section class="field">
                    <h3>"💬 Manage Chat"</h3>
                    <button class="clear" disabled=move || !enabled() on:click=clear_chat>
                        "Clear Conversation"
                    </button>
                </section>

                <hr />
                <p class="info">"Built with Rust, axum & Leptos"</p>
            </aside>

            <main class="chat-main">
                <h1>"🤖 LangChain Search Bot"</h1>
                <p class="caption">
                    {move || session.with(|s| s.as_ref().map(|s| s.caption.clone()).unwrap_or_default())}
                </p>

                <Show when=move || load_error.get().is_some()>
                    <p class="error">{move || load_error.get().unwrap_or_default()}</p>
                </Show>

                <div class="messages">
                    <For
                        each=move || {
                            session.with(|s| s.as_ref().map(|s| s.transcript.clone()).unwrap_or_default())
                                .into_iter()
                                .enumerate()
                                .collect::<Vec<_>>()
                        }
                        key=|(idx, msg)| (*idx, msg.timestamp)
                        children=move |(_, msg)| {
                            let msg_steps = steps.with_untracked(|all| {
                                all.iter()
                                    .find(|(at, _)| *at == msg.timestamp)
                                    .map(|(_, s)| s.clone())
                                    .unwrap_or_default()
                            });
                            view! { <MessageBubble message=msg steps=msg_steps /> }
                        }
                    />
                    <Show when=move || pending.get().is_some()>
                        <div class="message message-user">
                            <p class="content">{move || pending.get().unwrap_or_default()}</p>
                        </div>
                    </Show>
                    <Show when=move || loading.get()>
                        <div class="message loading">{move || format!("Asking {}...", model())}</div>
                    </Show>
                </div>

                <div class="input-area">
                    <textarea
                        placeholder=move || {
                            if enabled() { "Ask me anything..." } else { "Please save API Key in sidebar to chat..." }
                        }
                        prop:value=move || input.get()
                        disabled=move || !enabled() || loading.get()
                        on:input=move |ev| set_input.set(event_target_value(&ev))
                        on:keydown=move |ev| {
                            if ev.key() == "Enter" && !ev.shift_key() {
                                ev.prevent_default();
                                send();
                            }
                        }
                    />
                    <button on:click=move |_| send() disabled=move || !enabled() || loading.get()>
                        {move || if loading.get() { "..." } else { "Send" }}
                    </button>
                </div>

                <hr />
                <p class="caption">"Ensure your Google API key has the necessary permissions and quotas."</p>
            </main>

            <Toast message=toast />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_messages() {
        assert_eq!(key_saved_toast(false), "API key saved!");
        assert_eq!(key_saved_toast(true), "API key updated!");
        assert_eq!(key_error(false), "Please enter a valid Google API key.");
        assert_eq!(key_error(true), "Please enter a valid Google API key to update.");
    }
}
