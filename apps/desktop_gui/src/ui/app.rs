use std::time::Duration;

use client_core::{
    state::{BannerStatus, Tab},
    view::{self, DashboardStats, MatchGrade, FAQ_ITEMS, PROCESS_STEPS},
    Action, EnrollForm, RevealPhase, ViewState,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{BiometricKind, BiometricRecord};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{err_label, SignatureRequest, UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const RECENT_LIMIT: usize = 5;

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,

    view: ViewState,
    status: String,
    last_error: Option<UiError>,
    signature_prompt: Option<SignatureRequest>,

    // Local drafts so typing never waits on a backend round trip.
    search_draft: String,
    enroll_draft: EnrollForm,

    queued: Vec<BackendCommand>,
}

impl DesktopGuiApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            view: ViewState::default(),
            status: "Starting...".to_string(),
            last_error: None,
            signature_prompt: None,
            search_draft: String::new(),
            enroll_draft: EnrollForm::default(),
            queued: Vec::new(),
        }
    }

    fn queue(&mut self, cmd: BackendCommand) {
        self.queued.push(cmd);
    }

    fn queue_view(&mut self, action: Action) {
        self.queued.push(BackendCommand::View(action));
    }

    fn flush_commands(&mut self) {
        for cmd in std::mem::take(&mut self.queued) {
            dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::StateChanged(state) => {
                    if !state.enroll_modal_open {
                        self.enroll_draft = state.enroll_form.clone();
                    }
                    self.view = *state;
                }
                UiEvent::SignatureRequested(request) => {
                    tracing::debug!(purpose = request.purpose.describe(), "showing signature prompt");
                    if let Some(previous) = self.signature_prompt.replace(request) {
                        previous.answer(false);
                    }
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), "{}", err.message());
                    self.status = format!("{}: {}", err_label(err.category()), err.message());
                    if !err.is_quiet() {
                        self.last_error = Some(err);
                    }
                }
            }
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("BioAuth FHE").size(22.0).strong());
                ui.label(egui::RichText::new("Privacy-preserving biometric authentication").weak());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match self.view.account.clone() {
                        Some(account) => {
                            if ui.button("Disconnect").clicked() {
                                self.queue(BackendCommand::DisconnectWallet);
                            }
                            ui.label(
                                egui::RichText::new(view::abbreviate_owner(&account)).monospace(),
                            );
                        }
                        None => {
                            if ui.button("Connect Wallet").clicked() {
                                self.queue(BackendCommand::ConnectWallet);
                            }
                        }
                    }
                });
            });

            ui.add_space(4.0);
            ui.horizontal(|ui| {
                let mut tab = self.view.active_tab;
                ui.selectable_value(&mut tab, Tab::Dashboard, "Dashboard");
                ui.selectable_value(&mut tab, Tab::Templates, "Templates");
                ui.selectable_value(&mut tab, Tab::Faq, "FAQ");
                if tab != self.view.active_tab {
                    self.view.active_tab = tab;
                    self.queue_view(Action::TabSelected(tab));
                }
            });
            ui.add_space(4.0);
        });
    }

    fn show_banner(&mut self, ctx: &egui::Context) {
        let Some(banner) = self.view.banner.clone() else {
            return;
        };
        let (fill, stroke) = match banner.status {
            BannerStatus::Pending => (
                egui::Color32::from_rgb(40, 64, 112),
                egui::Color32::from_rgb(88, 124, 196),
            ),
            BannerStatus::Success => (
                egui::Color32::from_rgb(36, 94, 62),
                egui::Color32::from_rgb(84, 164, 116),
            ),
            BannerStatus::Error => (
                egui::Color32::from_rgb(111, 53, 53),
                egui::Color32::from_rgb(175, 96, 96),
            ),
        };

        egui::TopBottomPanel::top("banner").show(ctx, |ui| {
            egui::Frame::NONE
                .fill(fill)
                .stroke(egui::Stroke::new(1.0, stroke))
                .corner_radius(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        if banner.status == BannerStatus::Pending {
                            ui.spinner();
                        }
                        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("Dismiss").clicked() {
                                self.queue_view(Action::BannerDismissed(banner.id));
                            }
                        });
                    });
                });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.small(egui::RichText::new(&self.status).weak());
                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.small(
                        egui::RichText::new(format!(
                            "{} error: {}",
                            err_label(err.category()),
                            err.message()
                        ))
                        .color(egui::Color32::from_rgb(220, 120, 120)),
                    );
                    if ui.small_button("Clear").clicked() {
                        self.last_error = None;
                    }
                }
            });
        });
    }

    fn show_dashboard(&mut self, ui: &mut egui::Ui) {
        let stats = DashboardStats::from_records(&self.view.records);

        ui.horizontal(|ui| {
            let enroll_label = view::enroll_button_label(self.view.enrolling);
            if ui
                .add_enabled(!self.view.enrolling, egui::Button::new(enroll_label))
                .clicked()
            {
                self.queue_view(Action::EnrollModalOpened);
            }
            let refresh_label = view::refresh_button_label(self.view.refreshing);
            if ui
                .add_enabled(!self.view.refreshing, egui::Button::new(refresh_label))
                .clicked()
            {
                self.queue(BackendCommand::Refresh);
            }
        });
        ui.add_space(8.0);

        ui.columns(3, |columns| {
            stat_card(
                &mut columns[0],
                "Total Enrollments",
                stats.total.to_string(),
                format!("+{} this month", stats.monthly_trend()),
            );
            stat_card(
                &mut columns[1],
                BiometricKind::Fingerprint.display_name(),
                stats.fingerprint.to_string(),
                share_label(stats.fingerprint_share()),
            );
            stat_card(
                &mut columns[2],
                BiometricKind::Facial.display_name(),
                stats.facial.to_string(),
                share_label(stats.facial_share()),
            );
        });

        ui.add_space(12.0);
        ui.label(egui::RichText::new("How FHE Biometric Authentication Works").strong());
        ui.horizontal_wrapped(|ui| {
            for (index, step) in PROCESS_STEPS.iter().enumerate() {
                ui.group(|ui| {
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(format!("{}. {}", index + 1, step.title)).strong());
                        ui.small(step.detail);
                    });
                });
            }
        });

        ui.add_space(12.0);
        ui.label(egui::RichText::new("Recent Enrollments").strong());
        let recent: Vec<BiometricRecord> = self
            .view
            .records
            .iter()
            .rev()
            .take(RECENT_LIMIT)
            .cloned()
            .collect();
        if recent.is_empty() {
            ui.label(egui::RichText::new("No biometric records found").weak());
        }
        for record in &recent {
            ui.horizontal(|ui| {
                ui.label(record.kind.display_name());
                ui.label(egui::RichText::new(view::short_id(record)).monospace());
                ui.label(egui::RichText::new(view::enrolled_date(record)).weak());
                if ui.small_button("Details").clicked() {
                    self.queue_view(Action::RecordSelected(record.id.clone()));
                }
            });
        }
    }

    fn show_templates(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Search");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_draft)
                    .hint_text("Search by type or id")
                    .desired_width(260.0),
            );
            if response.changed() {
                self.queue_view(Action::SearchChanged(self.search_draft.clone()));
            }
        });
        ui.add_space(8.0);

        let records: Vec<BiometricRecord> = self
            .view
            .filtered_records()
            .into_iter()
            .cloned()
            .collect();
        if records.is_empty() {
            ui.label(egui::RichText::new("No biometric records found").weak());
            if ui.button("Enroll First Biometric").clicked() {
                self.queue_view(Action::EnrollModalOpened);
            }
            return;
        }

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("templates_grid")
                    .striped(true)
                    .num_columns(6)
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new("ID").strong());
                        ui.label(egui::RichText::new("Type").strong());
                        ui.label(egui::RichText::new("Enrolled").strong());
                        ui.label(egui::RichText::new("Owner").strong());
                        ui.label(egui::RichText::new("Template").strong());
                        ui.label("");
                        ui.end_row();

                        for record in &records {
                            ui.label(egui::RichText::new(view::short_id(record)).monospace());
                            ui.label(record.kind.display_name());
                            ui.label(view::enrolled_date(record));
                            ui.label(
                                egui::RichText::new(view::abbreviate_owner(&record.owner))
                                    .monospace(),
                            );
                            ui.label(
                                egui::RichText::new(view::template_preview(record, 16))
                                    .monospace()
                                    .weak(),
                            );
                            if ui.small_button("View").clicked() {
                                self.queue_view(Action::RecordSelected(record.id.clone()));
                            }
                            ui.end_row();
                        }
                    });
            });
    }

    fn show_faq(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Frequently Asked Questions").strong());
        ui.add_space(6.0);
        for (index, item) in FAQ_ITEMS.iter().enumerate() {
            egui::CollapsingHeader::new(item.question)
                .id_salt(("faq", index))
                .show(ui, |ui| {
                    ui.label(item.answer);
                });
        }
    }

    fn show_enroll_window(&mut self, ctx: &egui::Context) {
        if !self.view.enroll_modal_open {
            return;
        }

        let mut open = true;
        let before = self.enroll_draft.clone();
        let mut submit = false;
        let mut cancel = false;

        egui::Window::new("Enroll New Biometric")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Biometric type");
                egui::ComboBox::from_id_salt("enroll_kind")
                    .selected_text(self.enroll_draft.kind.display_name())
                    .show_ui(ui, |ui| {
                        for kind in BiometricKind::ALL {
                            ui.selectable_value(&mut self.enroll_draft.kind, kind, kind.display_name());
                        }
                    });

                ui.add_space(6.0);
                ui.label("Match score (0-100)");
                ui.add(
                    egui::TextEdit::singleline(&mut self.enroll_draft.score)
                        .hint_text("75")
                        .desired_width(120.0),
                );
                ui.small(
                    egui::RichText::new("The template is encrypted with Zama FHE before it is stored.")
                        .weak(),
                );

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                    let can_submit = !self.view.enrolling && self.enroll_draft.can_submit();
                    if ui
                        .add_enabled(
                            can_submit,
                            egui::Button::new(view::enroll_button_label(self.view.enrolling)),
                        )
                        .clicked()
                    {
                        submit = true;
                    }
                });
            });

        if self.enroll_draft != before {
            self.queue_view(Action::EnrollFormEdited(self.enroll_draft.clone()));
        }
        if submit {
            self.queue(BackendCommand::Enroll(self.enroll_draft.clone()));
        }
        if cancel || !open {
            self.queue_view(Action::EnrollModalClosed);
        }
    }

    fn show_detail_window(&mut self, ctx: &egui::Context) {
        let Some(record) = self.view.selected_record().cloned() else {
            return;
        };
        let reveal = self.view.reveal;
        let busy = self.view.is_decrypting();

        let mut open = true;
        let mut toggle = false;

        egui::Window::new("Biometric Details")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("detail_grid").num_columns(2).show(ui, |ui| {
                    ui.label("ID");
                    ui.label(egui::RichText::new(record.id.as_str()).monospace());
                    ui.end_row();
                    ui.label("Type");
                    ui.label(record.kind.display_name());
                    ui.end_row();
                    ui.label("Enrolled");
                    ui.label(view::enrolled_date(&record));
                    ui.end_row();
                    ui.label("Owner");
                    ui.label(egui::RichText::new(&record.owner).monospace());
                    ui.end_row();
                });

                ui.add_space(6.0);
                ui.label("Encrypted template");
                ui.add(
                    egui::Label::new(egui::RichText::new(&record.encrypted_template).monospace())
                        .wrap(),
                );

                ui.add_space(8.0);
                match reveal {
                    RevealPhase::Revealed { score } => {
                        ui.label(
                            egui::RichText::new(format!("Match score: {}", view::format_score(score)))
                                .size(18.0)
                                .strong(),
                        );
                        ui.label(MatchGrade::from_score(score).label());
                    }
                    RevealPhase::AwaitingSignature => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Waiting for wallet signature...");
                        });
                    }
                    RevealPhase::Decrypting => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Decrypting with FHE...");
                        });
                    }
                    RevealPhase::Idle => {
                        ui.label(egui::RichText::new("Score is encrypted").weak());
                    }
                }

                ui.add_space(6.0);
                if ui
                    .add_enabled(!busy, egui::Button::new(view::decrypt_button_label(reveal)))
                    .clicked()
                {
                    toggle = true;
                }
            });

        if toggle {
            self.queue(BackendCommand::ToggleReveal(record.id.clone()));
        }
        if !open {
            self.queue_view(Action::DetailClosed);
        }
    }

    fn show_signature_prompt(&mut self, ctx: &egui::Context) {
        let Some(request) = &self.signature_prompt else {
            return;
        };

        let mut decision = None;
        egui::Window::new(request.title())
            .id(egui::Id::new("signature_prompt"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(format!("The app is requesting a {}.", request.purpose.describe()));
                ui.add_space(6.0);
                egui::ScrollArea::vertical()
                    .max_height(180.0)
                    .show(ui, |ui| {
                        ui.add(
                            egui::Label::new(egui::RichText::new(&request.message).monospace())
                                .wrap(),
                        );
                    });
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Reject").clicked() {
                        decision = Some(false);
                    }
                    if ui.button("Sign").clicked() {
                        decision = Some(true);
                    }
                });
            });

        if let Some(approved) = decision {
            if let Some(request) = self.signature_prompt.take() {
                request.answer(approved);
            }
        }
    }
}

fn stat_card(ui: &mut egui::Ui, title: &str, value: String, detail: String) {
    ui.group(|ui| {
        ui.set_min_width(ui.available_width());
        ui.label(egui::RichText::new(title).weak());
        ui.label(egui::RichText::new(value).size(26.0).strong());
        ui.small(detail);
    });
}

fn share_label(share: Option<usize>) -> String {
    share.map_or_else(|| "No enrollments yet".to_string(), |pct| format!("{pct}% of total"))
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_header(ctx);
        self.show_banner(ctx);
        self.show_status_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.view.loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(80.0);
                    ui.spinner();
                    ui.label("Initializing encrypted biometric system...");
                });
                return;
            }
            match self.view.active_tab {
                Tab::Dashboard => self.show_dashboard(ui),
                Tab::Templates => self.show_templates(ui),
                Tab::Faq => self.show_faq(ui),
            }
        });

        self.show_enroll_window(ctx);
        self.show_detail_window(ctx);
        self.show_signature_prompt(ctx);

        self.flush_commands();
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
