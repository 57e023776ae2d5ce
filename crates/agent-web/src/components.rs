//! UI Components

use leptos::prelude::*;

use crate::api::{AgentStep, ChatMessage};

/// Message bubble component; assistant replies may carry the agent's steps
#[component]
pub fn MessageBubble(message: ChatMessage, #[prop(optional)] steps: Vec<AgentStep>) -> impl IntoView {
    let class = format!("message message-{}", message.role);
    let time = message.timestamp.format("%H:%M").to_string();
    let has_steps = !steps.is_empty();

    view! {
        <div class=class>
            <span class="role">{message.role.clone()}</span>
            <span class="time">{time}</span>
            {has_steps.then(|| view! { <StepsPanel steps=steps /> })}
            <p class="content">{message.content.clone()}</p>
        </div>
    }
}

/// Summary line of a collapsed steps panel
pub fn steps_label(steps: &[AgentStep]) -> String {
    match steps.len() {
        1 => "Thought process (1 step)".into(),
        n => format!("Thought process ({n} steps)"),
    }
}

/// Completed thoughts and tool calls, collapsed
#[component]
fn StepsPanel(steps: Vec<AgentStep>) -> impl IntoView {
    let label = steps_label(&steps);
    let rows = steps
        .into_iter()
        .map(|step| {
            view! {
                <li class="step">
                    {(!step.thought.is_empty()).then(|| view! { <p class="thought">{step.thought}</p> })}
                    <p class="action">
                        <strong>{step.tool}</strong>
                        ": "
                        <code>{step.tool_input}</code>
                    </p>
                    <pre class="observation">{step.observation}</pre>
                </li>
            }
        })
        .collect_view();

    view! {
        <details class="steps">
            <summary>{label}</summary>
            <ol>{rows}</ol>
        </details>
    }
}

/// Transient notice in the corner; cleared by the owner
#[component]
pub fn Toast(message: ReadSignal<Option<String>>) -> impl IntoView {
    view! {
        <Show when=move || message.get().is_some()>
            <div class="toast">{move || message.get().unwrap_or_default()}</div>
        </Show>
    }
}

/// Key entry before a key exists; update and clear afterwards
#[component]
pub fn ApiKeySection(
    key_set: Signal<bool>,
    error: ReadSignal<Option<String>>,
    on_submit: Callback<String>,
    on_clear: Callback<()>,
) -> impl IntoView {
    let (draft, set_draft) = signal(String::new());
    let submit = move || {
        on_submit.run(draft.get());
        set_draft.set(String::new());
    };

    let key_input = move |placeholder: &'static str| {
        view! {
            <input
                type="password"
                placeholder=placeholder
                prop:value=move || draft.get()
                on:input=move |ev| set_draft.set(event_target_value(&ev))
            />
        }
    };

    view! {
        <section class="api-key">
            <h3>"🔑 API Key"</h3>
            <Show
                when=move || key_set.get()
                fallback=move || view! {
                    {key_input("Enter your Google API key")}
                    <button on:click=move |_| submit()>"Save API Key"</button>
                }
            >
                <p class="notice">"Google API Key is set."</p>
                <details>
                    <summary>"Modify API Key"</summary>
                    {key_input("New Google API key")}
                    <button on:click=move |_| submit()>"Update API Key"</button>
                    <button class="danger" on:click=move |_| on_clear.run(())>"Clear API Key"</button>
                </details>
            </Show>
            <Show when=move || error.get().is_some()>
                <p class="error">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </section>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tool: &str) -> AgentStep {
        AgentStep {
            thought: String::new(),
            tool: tool.into(),
            tool_input: "q".into(),
            observation: "o".into(),
        }
    }

    #[test]
    fn test_steps_label() {
        assert_eq!(steps_label(&[step("Search")]), "Thought process (1 step)");
        assert_eq!(
            steps_label(&[step("Search"), step("arxiv")]),
            "Thought process (2 steps)"
        );
    }
}
