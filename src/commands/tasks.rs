//! Task commands: `toggle` and `tasks`.

use std::fmt::Write as _;

use super::open;
use crate::pipeline::Controller;
use crate::spec::{parse_checklist, sync_progress, Progress};
use crate::stage::Stage;

/// Execute `toggle`.
///
/// # Errors
///
/// Returns an error string if the spec has no tasks document or `id` names
/// no task.
pub fn toggle(controller: &Controller<'_>, spec: &str, id: &str) -> Result<(), String> {
    open(controller, spec)?;
    match controller.toggle_task(id).map_err(|e| e.to_string())? {
        Some(_) => Ok(()),
        None => Err(format!("Spec \"{spec}\" has no tasks document yet.")),
    }
}

/// Execute `tasks`: every checklist line with its id and tracked state.
///
/// # Errors
///
/// Returns an error string if the spec has no tasks document.
pub fn list(controller: &Controller<'_>, spec: &str) -> Result<(), String> {
    open(controller, spec)?;
    let document = controller
        .content(Stage::Tasks)
        .ok_or_else(|| format!("Spec \"{spec}\" has no tasks document yet."))?;
    let progress = sync_progress(controller.store().read_progress(spec).as_ref(), &document);
    print!("{}", format_tasks(&document, &progress));
    Ok(())
}

fn format_tasks(document: &str, progress: &Progress) -> String {
    let items = parse_checklist(document);
    let id_width = items.iter().map(|i| i.id.len()).max().unwrap_or(2);

    let mut out = String::new();
    for item in &items {
        let mark = if progress.is_checked(&item.id, item.checked) { 'x' } else { ' ' };
        let _ = write!(out, "[{mark}] {:<id_width$}  {}", item.id, item.label);
        if let Some(size) = &item.size {
            let _ = write!(out, " ({size})");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "\n{}/{} done ({}%)", progress.done, progress.total, progress.percent());
    out
}
