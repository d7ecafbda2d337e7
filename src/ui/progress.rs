use crate::events::{ProgressBus, Subscription};
use crate::ui::icons::{CHECK, CROSS, FOLDER, PEN, SPARKLE, STOP, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use scribe_common::{
    PhaseProgress, PhaseStatus, ProgressEvent, Session, SessionProgress, SessionStatus,
};
use std::sync::Arc;
use std::time::Duration;

/// Terminal view of one session's generation, rendered via `indicatif`.
///
/// Two bars are stacked vertically:
/// - Phase bar: completed phases out of the total
/// - Activity bar: spinner naming the phase being generated
///
/// The UI never drives the orchestrator. It only reacts to events published
/// on the progress bus, see [`SessionProgressUI::attach`].
pub struct SessionProgressUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    activity_bar: ProgressBar,
    verbose: bool,
}

impl SessionProgressUI {
    pub fn new(total_phases: u64, verbose: bool) -> Self {
        Self::with_target(total_phases, verbose, ProgressDrawTarget::stderr())
    }

    /// A UI that tracks state but draws nothing.
    pub fn hidden(total_phases: u64) -> Self {
        Self::with_target(total_phases, false, ProgressDrawTarget::hidden())
    }

    fn with_target(total_phases: u64, verbose: bool, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        let phase_bar = multi.add(ProgressBar::new(total_phases));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let activity_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let activity_bar = multi.add(ProgressBar::new_spinner());
        activity_bar.set_style(activity_style);
        activity_bar.set_prefix("   Now");

        Self {
            multi,
            phase_bar,
            activity_bar,
            verbose,
        }
    }

    /// Subscribe this UI to `session_id` on `bus`.
    ///
    /// Rendering stops when the returned subscription is dropped.
    pub fn attach(self: &Arc<Self>, bus: &Arc<ProgressBus>, session_id: &str) -> Subscription {
        let ui = Arc::clone(self);
        bus.subscribe(session_id, move |event: &ProgressEvent| ui.handle(event))
    }

    /// Start the phase bar at `completed`, for resumed sessions.
    pub fn set_completed(&self, completed: u64) {
        self.phase_bar.set_position(completed);
    }

    pub fn completed(&self) -> u64 {
        self.phase_bar.position()
    }

    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Phase(phase) => self.on_phase(phase),
            ProgressEvent::Session(session) => self.on_session(session),
        }
    }

    fn on_phase(&self, event: &PhaseProgress) {
        match event.status {
            PhaseStatus::InProgress => {
                self.phase_bar.set_message(format!(
                    "{}: {}",
                    style(event.phase_order).yellow(),
                    event.phase_name
                ));
                self.activity_bar.set_message(format!(
                    "{}{}",
                    PEN,
                    style(&event.message).dim()
                ));
                self.activity_bar
                    .enable_steady_tick(Duration::from_millis(100));
            }
            PhaseStatus::Completed => {
                self.phase_bar.inc(1);
                let icon = if event.message.contains("unvalidated") {
                    WARN
                } else {
                    CHECK
                };
                self.print_line(format!("  {}{}", icon, event.message));
            }
            PhaseStatus::Failed => {
                self.print_line(format!(
                    "  {}Phase {} failed: {}",
                    CROSS,
                    style(&event.phase_name).red().bold(),
                    event.message
                ));
            }
            PhaseStatus::Pending => {
                if self.verbose {
                    self.print_line(format!("    {}", style(&event.message).dim()));
                }
            }
        }
    }

    fn on_session(&self, event: &SessionProgress) {
        match event.status {
            SessionStatus::Running => {
                if self.verbose {
                    self.print_line(format!("    {} {}", style("→").dim(), style(&event.message).dim()));
                }
            }
            SessionStatus::Completed if event.completed_phases == event.total_phases => {
                self.activity_bar.finish_and_clear();
                self.phase_bar
                    .finish_with_message(format!("{}", style("done").green()));
            }
            SessionStatus::Completed | SessionStatus::Pending => {}
            SessionStatus::Failed => {
                self.activity_bar.abandon_with_message(format!(
                    "{}{}",
                    CROSS,
                    style(&event.message).red()
                ));
                self.phase_bar.abandon();
            }
        }
    }

    /// Stop the spinners after a cancelled run.
    pub fn cancelled(&self) {
        self.activity_bar
            .abandon_with_message(format!("{}{}", STOP, style("cancelled").yellow()));
        self.phase_bar.abandon();
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn print_summary(&self, session: &Session) {
        print_session_summary(session);
    }
}

/// Plain summary of a session's outcome and content files.
pub fn print_session_summary(session: &Session) {
    println!();
    let headline = match session.status {
        SessionStatus::Completed => format!("{}Session {} complete", SPARKLE, style(&session.id).green().bold()),
        SessionStatus::Failed => format!("{}Session {} failed", CROSS, style(&session.id).red().bold()),
        _ => format!("Session {} is {}", style(&session.id).bold(), session.status),
    };
    println!("{}", headline);
    if let Some(error) = &session.error_message {
        println!("  {} {}", style("Error:").red(), error);
    }
    println!(
        "  {} {} words, ~{}s spoken",
        style("Total:").dim(),
        session.total_word_count,
        session.total_duration_secs
    );
    println!("  {}{}", FOLDER, session.output_dir.display());
    for record in &session.phases {
        let marker = match record.status {
            PhaseStatus::Completed if record.validated => style("✓").green(),
            PhaseStatus::Completed => style("!").yellow(),
            PhaseStatus::Failed => style("✗").red(),
            PhaseStatus::InProgress => style("…").cyan(),
            PhaseStatus::Pending => style("·").dim(),
        };
        println!(
            "  {} {:02} {:<20} {:>5} words",
            marker, record.order, record.name, record.word_count
        );
        for warning in &record.warnings {
            println!("       {}", style(warning).dim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_event(status: PhaseStatus, message: &str) -> ProgressEvent {
        ProgressEvent::Phase(PhaseProgress {
            session_id: "s1".into(),
            phase_id: "hook".into(),
            phase_name: "Hook".into(),
            phase_order: 1,
            total_phases: 2,
            status,
            message: message.into(),
        })
    }

    #[test]
    fn test_completed_phases_advance_bar() {
        let ui = SessionProgressUI::hidden(2);
        ui.handle(&phase_event(PhaseStatus::InProgress, "Generating Hook"));
        assert_eq!(ui.completed(), 0);
        ui.handle(&phase_event(PhaseStatus::Completed, "Hook completed (80 words)"));
        assert_eq!(ui.completed(), 1);
        ui.handle(&phase_event(PhaseStatus::Failed, "boom"));
        assert_eq!(ui.completed(), 1);
    }

    #[test]
    fn test_attach_receives_bus_events() {
        let bus = Arc::new(ProgressBus::new());
        let ui = Arc::new(SessionProgressUI::hidden(2));
        ui.set_completed(1);
        let sub = ui.attach(&bus, "s1");
        bus.publish("s1", &phase_event(PhaseStatus::Completed, "Hook completed"));
        bus.publish("other", &phase_event(PhaseStatus::Completed, "Hook completed"));
        assert_eq!(ui.completed(), 2);

        drop(sub);
        bus.publish("s1", &phase_event(PhaseStatus::Completed, "again"));
        assert_eq!(ui.completed(), 2);
    }

    #[test]
    fn test_session_events_do_not_panic() {
        let ui = SessionProgressUI::hidden(1);
        ui.handle(&ProgressEvent::Session(SessionProgress::new(
            "s1",
            SessionStatus::Running,
            0,
            1,
            "started",
        )));
        ui.handle(&ProgressEvent::Session(SessionProgress::new(
            "s1",
            SessionStatus::Failed,
            0,
            1,
            "Phase 'Hook' failed",
        )));
        ui.cancelled();
    }
}
