use weft_core::{use_reducer, use_state, Output, Props, RenderError};
use weft_html::tags::{div, h1, li, p, ul};
use weft_html::text;
use weft_macros::component;

use crate::input::use_input;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterAction {
    Increment,
    Decrement,
    Reset,
}

impl CounterAction {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "+" => Some(Self::Increment),
            "-" => Some(Self::Decrement),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

fn count_reducer(count: &i64, action: CounterAction) -> i64 {
    match action {
        CounterAction::Increment => count + 1,
        CounterAction::Decrement => count - 1,
        CounterAction::Reset => 0,
    }
}

#[component]
pub fn App(props: &Props) -> Result<Output, RenderError> {
    let title = props.get_str("title").unwrap_or("weft terminal demo").to_string();
    let limit = props.get_int("limit").unwrap_or(5);
    Ok(div()
        .child(h1().child(text(title)))
        .child(Counter.el())
        .child(Echo.el().prop("limit", limit))
        .into())
}

#[component]
pub fn Counter() -> Result<Output, RenderError> {
    let (count, dispatch) = use_reducer(count_reducer, 0)?;
    use_input(move |line| {
        if let Some(action) = CounterAction::parse(&line) {
            dispatch.dispatch(action);
        }
    })?;
    Ok(p().child(text(format!("count: {count}"))).into())
}

/// Echoes the most recent non-command lines, newest last.
#[component]
pub fn Echo(props: &Props) -> Result<Output, RenderError> {
    let limit = props.get_int("limit").unwrap_or(5).max(1) as usize;
    let (history, set_history) = use_state(Vec::<(u64, String)>::new())?;
    use_input(move |line| {
        if CounterAction::parse(&line).is_some() {
            return;
        }
        set_history.update(|history| {
            let seq = history.last().map_or(0, |(seq, _)| seq + 1);
            let mut next = history.clone();
            next.push((seq, line));
            let excess = next.len().saturating_sub(limit);
            next.drain(..excess);
            next
        });
    })?;

    if history.is_empty() {
        return Ok(p().child(text("nothing echoed yet")).into());
    }
    let lines = history
        .iter()
        .map(|(seq, line)| li().key(seq.to_string()).child(text(format!("> {line}"))));
    Ok(ul().children(lines).into())
}
