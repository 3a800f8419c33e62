use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use eframe::egui::{self, Align, Color32, Layout, RichText, ScrollArea, TextEdit, Ui};

use crate::pattern::model::{
    PatternEntry, export_file_name, load_pattern_file, save_pattern_file,
};
use crate::pattern::scheduler::{EntryTrigger, entry_trigger_times, format_entry_trigger,
    format_hms, Prediction};
use crate::session::{SessionEvent, SessionObserver, StopwatchSession};

const MAX_TICKS_PER_UPDATE: usize = 64;

pub fn run_gui(session: StopwatchSession, tick_ms: u64, pattern_file: Option<PathBuf>) -> Result<()> {
    let native_options = eframe::NativeOptions {
        vsync: false,
        viewport: egui::ViewportBuilder::default()
            .with_title("SeagullWatch")
            .with_inner_size([980.0, 680.0])
            .with_min_inner_size([760.0, 520.0]),
        ..Default::default()
    };

    let app = SeagullWatchApp::new(session, tick_ms, pattern_file);

    eframe::run_native(
        "SeagullWatch",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch SeagullWatch GUI: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(Color32::from_rgb(228, 233, 240));
    visuals.panel_fill = Color32::from_rgb(14, 18, 27);
    visuals.window_fill = Color32::from_rgb(18, 23, 33);
    visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(16, 21, 31);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(24, 30, 42);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(36, 48, 66);
    visuals.widgets.active.bg_fill = Color32::from_rgb(48, 66, 92);
    visuals.selection.bg_fill = Color32::from_rgb(62, 132, 172);
    ctx.set_visuals(visuals);
}

#[derive(Clone, Default)]
struct EventLog(Rc<RefCell<Vec<SessionEvent>>>);

impl SessionObserver for EventLog {
    fn on_event(&mut self, event: &SessionEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

struct SeagullWatchApp {
    session: StopwatchSession,
    events: Rc<RefCell<Vec<SessionEvent>>>,
    tick_step: Duration,
    next_tick: Instant,
    status_message: Option<(String, Instant)>,
    hours_input: String,
    minutes_input: String,
    seconds_input: String,
    message_input: String,
    edit_index: Option<usize>,
    edit_hours: String,
    edit_minutes: String,
    edit_seconds: String,
    edit_message: String,
    file_input: String,
}

impl SeagullWatchApp {
    fn new(mut session: StopwatchSession, tick_ms: u64, pattern_file: Option<PathBuf>) -> Self {
        let recorder = EventLog::default();
        let events = recorder.0.clone();
        session.subscribe(Box::new(recorder));
        let tick_step = Duration::from_millis(tick_ms.max(1));
        Self {
            session,
            events,
            tick_step,
            next_tick: Instant::now() + tick_step,
            status_message: None,
            hours_input: String::new(),
            minutes_input: String::new(),
            seconds_input: String::new(),
            message_input: String::new(),
            edit_index: None,
            edit_hours: String::new(),
            edit_minutes: String::new(),
            edit_seconds: String::new(),
            edit_message: String::new(),
            file_input: pattern_file
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        }
    }

    fn set_status(&mut self, text: impl Into<String>, ttl: Duration) {
        self.status_message = Some((text.into(), Instant::now() + ttl));
    }

    fn drive_ticks(&mut self) {
        let now = Instant::now();
        if now < self.next_tick {
            return;
        }
        self.session.tick(now);
        let mut skipped = 0;
        while self.next_tick <= now && skipped < MAX_TICKS_PER_UPDATE {
            self.next_tick += self.tick_step;
            skipped += 1;
        }
        if self.next_tick <= now {
            self.next_tick = now + self.tick_step;
        }
    }

    fn drain_events(&mut self) {
        let drained: Vec<SessionEvent> = self.events.borrow_mut().drain(..).collect();
        for event in drained {
            if let SessionEvent::EntryFired { label, .. } = event {
                let text = if label.is_empty() {
                    "Alarm!".to_string()
                } else {
                    format!("Alarm: {label}")
                };
                self.set_status(text, Duration::from_secs(4));
            }
        }
    }

    fn show_header(&mut self, ui: &mut Ui) {
        let now = Instant::now();
        let snapshot = self.session.snapshot(now);
        let active_label = snapshot
            .active_entry
            .and_then(|index| self.session.sequence().entries().get(index))
            .map(|entry| entry.label.clone())
            .filter(|label| !label.is_empty());

        ui.horizontal_wrapped(|ui| {
            ui.label(
                RichText::new("SeagullWatch")
                    .size(24.0)
                    .color(Color32::from_rgb(96, 200, 228))
                    .strong(),
            );
            ui.separator();
            ui.label(
                RichText::new(format_hms(snapshot.elapsed_ms))
                    .size(34.0)
                    .color(Color32::from_rgb(255, 214, 117))
                    .monospace()
                    .strong(),
            );
            if let Some(label) = active_label {
                ui.label(
                    RichText::new(label)
                        .size(20.0)
                        .color(Color32::from_rgb(108, 228, 138)),
                );
            } else if self.session.schedule().is_terminal()
                && !self.session.sequence().is_empty()
                && snapshot.elapsed_ms > 0
            {
                ui.label(
                    RichText::new("patterns finished")
                        .size(20.0)
                        .color(Color32::from_rgb(255, 183, 95)),
                );
            }
            ui.separator();
            ui.label(
                RichText::new(Local::now().format("%A, %B %d %Y").to_string())
                    .size(16.0)
                    .color(Color32::from_rgb(169, 188, 209)),
            );
        });

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!snapshot.running, egui::Button::new("Start"))
                .clicked()
            {
                self.session.start(Instant::now());
                self.next_tick = Instant::now() + self.tick_step;
            }
            if ui
                .add_enabled(snapshot.running, egui::Button::new("Pause"))
                .clicked()
            {
                self.session.pause(Instant::now());
            }
            if ui.button("Reset").clicked() {
                self.session.reset();
                self.set_status("Stopwatch reset.", Duration::from_secs(2));
            }
        });

        if let Some((text, _)) = &self.status_message {
            ui.label(
                RichText::new(text)
                    .color(Color32::from_rgb(111, 228, 134))
                    .strong(),
            );
        }
    }

    fn show_pattern_list(&mut self, ui: &mut Ui) {
        ui.heading(
            RichText::new("Alarm Patterns")
                .color(Color32::from_rgb(104, 221, 205))
                .strong(),
        );
        ui.add_space(4.0);

        if self.session.sequence().is_empty() {
            ui.label(
                RichText::new("No patterns yet. Add one on the right.")
                    .color(Color32::from_rgb(255, 190, 106)),
            );
            return;
        }

        let now = Instant::now();
        let elapsed = self.session.elapsed_ms(now);
        let editable = !self.session.is_running();
        let active_entry = self.session.active_entry();
        let triggers = entry_trigger_times(self.session.sequence(), elapsed);
        let rows: Vec<(PatternEntry, EntryTrigger)> = self
            .session
            .sequence()
            .entries()
            .iter()
            .cloned()
            .zip(triggers)
            .collect();

        let mut remove_index: Option<usize> = None;
        let mut move_request: Option<(usize, usize)> = None;
        let mut begin_edit: Option<usize> = None;

        ScrollArea::vertical().id_salt("patterns_scroll").show(ui, |ui| {
            egui::Grid::new("patterns_grid")
                .striped(true)
                .num_columns(5)
                .show(ui, |ui| {
                    ui.label(RichText::new("#").strong());
                    ui.label(RichText::new("Message").strong());
                    ui.label(RichText::new("Duration").strong());
                    ui.label(RichText::new("Next").strong());
                    ui.label(RichText::new("Actions").strong());
                    ui.end_row();

                    for (index, (entry, trigger)) in rows.iter().enumerate() {
                        let is_active = active_entry == Some(index);
                        let row_color = if is_active {
                            Color32::from_rgb(108, 228, 138)
                        } else {
                            Color32::from_rgb(200, 208, 220)
                        };
                        ui.colored_label(row_color, format!("{index}"));
                        let message = if entry.label.is_empty() {
                            "(no message)".to_string()
                        } else {
                            entry.label.clone()
                        };
                        ui.colored_label(row_color, message);
                        ui.colored_label(
                            row_color,
                            RichText::new(format_hms(entry.duration_ms)).monospace(),
                        );
                        ui.colored_label(row_color, format_entry_trigger(*trigger));
                        ui.horizontal(|ui| {
                            if ui
                                .add_enabled(editable && index > 0, egui::Button::new("Up"))
                                .clicked()
                            {
                                move_request = Some((index, index - 1));
                            }
                            if ui
                                .add_enabled(
                                    editable && index + 1 < rows.len(),
                                    egui::Button::new("Down"),
                                )
                                .clicked()
                            {
                                move_request = Some((index, index + 1));
                            }
                            if ui.add_enabled(editable, egui::Button::new("Edit")).clicked() {
                                begin_edit = Some(index);
                            }
                            if ui
                                .add_enabled(editable, egui::Button::new("Delete"))
                                .clicked()
                            {
                                remove_index = Some(index);
                            }
                        });
                        ui.end_row();
                    }
                });
        });

        if let Some(index) = begin_edit {
            let entry = self.session.sequence().entries()[index].clone();
            let (hours, minutes, seconds) = entry.hms();
            self.edit_index = Some(index);
            self.edit_hours = format!("{hours:02}");
            self.edit_minutes = format!("{minutes:02}");
            self.edit_seconds = format!("{seconds:02}");
            self.edit_message = entry.label;
        }
        if let Some((from, to)) = move_request {
            match self.session.move_entry(from, to) {
                Ok(()) => self.edit_index = None,
                Err(err) => self.set_status(format!("Move failed: {err}"), Duration::from_secs(3)),
            }
        }
        if let Some(index) = remove_index {
            match self.session.remove_entry(index) {
                Ok(removed) => {
                    self.edit_index = None;
                    let name = if removed.label.is_empty() {
                        format!("pattern {index}")
                    } else {
                        removed.label
                    };
                    self.set_status(format!("Removed {name}."), Duration::from_secs(3));
                }
                Err(err) => {
                    self.set_status(format!("Delete failed: {err}"), Duration::from_secs(3));
                }
            }
        }

        if self.edit_index.is_some() {
            ui.separator();
            self.show_edit_form(ui);
        }
    }

    fn show_edit_form(&mut self, ui: &mut Ui) {
        let Some(index) = self.edit_index else {
            return;
        };
        ui.label(
            RichText::new(format!("Editing pattern {index}"))
                .color(Color32::from_rgb(255, 214, 117))
                .strong(),
        );
        ui.horizontal(|ui| {
            time_input(ui, &mut self.edit_hours, "HH");
            ui.label(":");
            time_input(ui, &mut self.edit_minutes, "MM");
            ui.label(":");
            time_input(ui, &mut self.edit_seconds, "SS");
            ui.add(
                TextEdit::singleline(&mut self.edit_message)
                    .desired_width(160.0)
                    .hint_text("message"),
            );
        });

        let duration_ms = duration_from_inputs(
            &self.edit_hours,
            &self.edit_minutes,
            &self.edit_seconds,
        );
        if duration_ms > 0 {
            let prediction = self
                .session
                .predict_resized_entry(index, duration_ms, Instant::now())
                .ok()
                .flatten();
            ui.label(prediction_text(prediction));
        }

        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                if duration_ms == 0 {
                    self.set_status("Enter a non-zero duration.", Duration::from_secs(3));
                } else {
                    let entry = PatternEntry::new(duration_ms, self.edit_message.trim());
                    match self.session.update_entry(index, entry) {
                        Ok(()) => {
                            self.edit_index = None;
                            self.set_status("Pattern updated.", Duration::from_secs(2));
                        }
                        Err(err) => {
                            self.set_status(format!("Update failed: {err}"), Duration::from_secs(3));
                        }
                    }
                }
            }
            if ui.button("Cancel").clicked() {
                self.edit_index = None;
            }
        });
    }

    fn show_controls(&mut self, ui: &mut Ui) {
        ui.heading(
            RichText::new("New Pattern")
                .color(Color32::from_rgb(104, 221, 205))
                .strong(),
        );
        ui.separator();

        let editable = !self.session.is_running();
        ui.horizontal(|ui| {
            time_input(ui, &mut self.hours_input, "HH");
            ui.label(":");
            time_input(ui, &mut self.minutes_input, "MM");
            ui.label(":");
            time_input(ui, &mut self.seconds_input, "SS");
        });
        ui.add(
            TextEdit::singleline(&mut self.message_input)
                .desired_width(200.0)
                .hint_text("message"),
        );

        let duration_ms =
            duration_from_inputs(&self.hours_input, &self.minutes_input, &self.seconds_input);
        if duration_ms > 0 {
            let prediction = self.session.predict_new_entry(duration_ms, Instant::now());
            ui.label(prediction_text(prediction));
        }

        if ui.add_enabled(editable, egui::Button::new("Add pattern")).clicked() {
            if duration_ms == 0 {
                self.set_status("Enter a non-zero duration.", Duration::from_secs(3));
            } else {
                let entry = PatternEntry::new(duration_ms, self.message_input.trim());
                match self.session.add_entry(entry) {
                    Ok(()) => {
                        self.hours_input.clear();
                        self.minutes_input.clear();
                        self.seconds_input.clear();
                        self.message_input.clear();
                        self.set_status("Pattern added.", Duration::from_secs(2));
                    }
                    Err(err) => {
                        self.set_status(format!("Add failed: {err}"), Duration::from_secs(3));
                    }
                }
            }
        }

        ui.add_space(8.0);
        let mut repeat = self.session.sequence().repeat();
        if ui
            .add_enabled(editable, egui::Checkbox::new(&mut repeat, "Repeat patterns"))
            .changed()
            && let Err(err) = self.session.set_repeat(repeat)
        {
            self.set_status(format!("Repeat toggle failed: {err}"), Duration::from_secs(3));
        }

        ui.add_space(12.0);
        ui.heading(
            RichText::new("Pattern File")
                .color(Color32::from_rgb(104, 221, 205))
                .strong(),
        );
        ui.separator();
        ui.add(
            TextEdit::singleline(&mut self.file_input)
                .desired_width(240.0)
                .hint_text(export_file_name(Local::now().date_naive())),
        );
        ui.horizontal(|ui| {
            if ui.add_enabled(editable, egui::Button::new("Load")).clicked() {
                self.load_patterns();
            }
            if ui.add_enabled(editable, egui::Button::new("Save")).clicked() {
                self.save_patterns();
            }
        });
    }

    fn load_patterns(&mut self) {
        let path = PathBuf::from(self.file_input.trim());
        if path.as_os_str().is_empty() {
            self.set_status("Enter a file path to load.", Duration::from_secs(3));
            return;
        }
        match load_pattern_file(&path) {
            Ok(file) => {
                let count = file.entries.len();
                match self.session.replace_sequence(file.entries, file.repeat) {
                    Ok(()) => {
                        self.edit_index = None;
                        log::info!("loaded {count} pattern(s) from {}", path.display());
                        self.set_status(
                            format!("Loaded {count} pattern(s)."),
                            Duration::from_secs(3),
                        );
                    }
                    Err(err) => {
                        self.set_status(format!("Load failed: {err}"), Duration::from_secs(4));
                    }
                }
            }
            Err(err) => self.set_status(format!("Load failed: {err:#}"), Duration::from_secs(5)),
        }
    }

    fn save_patterns(&mut self) {
        let trimmed = self.file_input.trim();
        let path = if trimmed.is_empty() {
            PathBuf::from(export_file_name(Local::now().date_naive()))
        } else {
            PathBuf::from(trimmed)
        };
        match save_pattern_file(&path, self.session.sequence()) {
            Ok(()) => {
                log::info!("saved pattern file {}", path.display());
                self.set_status(format!("Saved {}.", path.display()), Duration::from_secs(3));
            }
            Err(err) => self.set_status(format!("Save failed: {err:#}"), Duration::from_secs(5)),
        }
    }
}

impl eframe::App for SeagullWatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some((_, expires)) = &self.status_message
            && Instant::now() >= *expires
        {
            self.status_message = None;
        }

        self.drive_ticks();
        self.drain_events();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.show_header(ui);
            ui.add_space(4.0);
        });

        egui::SidePanel::right("controls_panel")
            .resizable(true)
            .min_width(300.0)
            .default_width(320.0)
            .show(ctx, |ui| self.show_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.with_layout(Layout::top_down(Align::Min), |ui| {
                self.show_pattern_list(ui);
            });
        });

        let wait = self.next_tick.saturating_duration_since(Instant::now());
        ctx.request_repaint_after(wait);
    }
}

fn time_input(ui: &mut Ui, value: &mut String, hint: &str) {
    ui.add(
        TextEdit::singleline(value)
            .desired_width(34.0)
            .hint_text(hint),
    );
}

// Empty or non-numeric components count as zero.
fn parse_time_component(text: &str) -> u64 {
    text.trim().parse::<u64>().unwrap_or(0)
}

fn duration_from_inputs(hours: &str, minutes: &str, seconds: &str) -> u64 {
    (parse_time_component(hours) * 3_600
        + parse_time_component(minutes) * 60
        + parse_time_component(seconds))
        * 1_000
}

fn prediction_text(prediction: Option<Prediction>) -> String {
    match prediction {
        Some(Prediction::At(ms)) => format!("(alarm at {})", format_hms(ms)),
        Some(Prediction::AlreadyPast) => "(alarm already past)".to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_invalid_components_parse_as_zero() {
        assert_eq!(duration_from_inputs("", "", ""), 0);
        assert_eq!(duration_from_inputs("1", "abc", "30"), 3_630_000);
        assert_eq!(duration_from_inputs("00", "05", "00"), 300_000);
    }

    #[test]
    fn prediction_text_distinguishes_past_from_pending() {
        assert_eq!(
            prediction_text(Some(Prediction::At(90_000))),
            "(alarm at 00:01:30)"
        );
        assert_eq!(
            prediction_text(Some(Prediction::AlreadyPast)),
            "(alarm already past)"
        );
        assert_eq!(prediction_text(None), "");
    }
}
