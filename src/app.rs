use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};

use sensory_mandala::audio_input::AudioInput;
use sensory_mandala::config::MandalaConfig;
use sensory_mandala::controller::{FEED_RANGE, KILL_RANGE};
use sensory_mandala::pipeline::MandalaPipeline;
use sensory_mandala::sensors::SensorReader;
use sensory_mandala::types::{Mode, PointerInput};

const MAX_FRAME_DT: f32 = 0.1;

pub struct MandalaApp {
    pipeline: MandalaPipeline,
    sensors: SensorReader,
    audio: Option<AudioInput>,
    audio_error: Option<String>,
    texture: Option<TextureHandle>,
    show_hud: bool,
    paused: bool,
    manual_rates: bool,
    manual_feed: f32,
    manual_kill: f32,
}

impl MandalaApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: MandalaConfig) -> Self {
        let pipeline = MandalaPipeline::new(&config, 960, 720);
        let cache = pipeline.sensors().clone();
        let sensors = cache.reader();

        let (audio, audio_error) = match AudioInput::start(cache) {
            Ok(input) => (Some(input), None),
            Err(err) => {
                tracing::warn!(error = %err, "microphone unavailable, running idle");
                (None, Some(err.to_string()))
            }
        };

        Self {
            pipeline,
            sensors,
            audio,
            audio_error,
            texture: None,
            show_hud: config.render.show_hud,
            paused: false,
            manual_rates: false,
            manual_feed: 0.035,
            manual_kill: 0.06,
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        ctx.input(|input| {
            if input.key_pressed(egui::Key::H) {
                self.show_hud = !self.show_hud;
            }
            if input.key_pressed(egui::Key::ArrowLeft) {
                self.pipeline.nudge_symmetry(-1);
            }
            if input.key_pressed(egui::Key::ArrowRight) {
                self.pipeline.nudge_symmetry(1);
            }
            for (key, mode) in [
                (egui::Key::Num1, Mode::Observe),
                (egui::Key::Num2, Mode::Draw),
                (egui::Key::Num3, Mode::Ancestor),
            ] {
                if input.key_pressed(key) {
                    self.pipeline.set_mode(mode);
                }
            }
        });
    }

    fn update_texture(&mut self, ctx: &egui::Context) {
        let frame = self.pipeline.frame();
        let image = ColorImage::from_rgba_unmultiplied(frame.dimensions(), &frame.to_rgba8());

        if let Some(texture) = &mut self.texture {
            texture.set(image, TextureOptions::LINEAR);
        } else {
            self.texture = Some(ctx.load_texture("mandala", image, TextureOptions::LINEAR));
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Mandala");
        ui.horizontal(|ui| {
            for mode in Mode::ALL {
                if ui
                    .selectable_label(self.pipeline.mode() == mode, mode.label())
                    .clicked()
                {
                    self.pipeline.set_mode(mode);
                }
            }
        });

        ui.horizontal(|ui| {
            if ui.button("−").clicked() {
                self.pipeline.nudge_symmetry(-1);
            }
            ui.label(format!("symmetry: {}", self.pipeline.symmetry()));
            if ui.button("+").clicked() {
                self.pipeline.nudge_symmetry(1);
            }
        });

        ui.horizontal(|ui| {
            if ui
                .button(if self.paused {
                    "Resume simulation"
                } else {
                    "Pause simulation"
                })
                .clicked()
            {
                self.paused = !self.paused;
            }

            if ui.button("Reseed field").clicked() {
                self.pipeline.reseed();
            }
        });

        ui.separator();
        ui.checkbox(&mut self.manual_rates, "manual feed / kill");
        ui.add_enabled(
            self.manual_rates,
            egui::Slider::new(&mut self.manual_feed, FEED_RANGE.0..=FEED_RANGE.1).text("feed"),
        );
        ui.add_enabled(
            self.manual_rates,
            egui::Slider::new(&mut self.manual_kill, KILL_RANGE.0..=KILL_RANGE.1).text("kill"),
        );
        let forced = self
            .manual_rates
            .then_some((self.manual_feed, self.manual_kill));
        if forced != self.pipeline.forced_feed_kill() {
            self.pipeline.force_feed_kill(forced);
        }

        ui.separator();
        ui.heading("Senses");
        let state = *self.pipeline.state();
        for (label, value) in [("low", state.low), ("mid", state.mid), ("high", state.high)] {
            ui.add(
                egui::ProgressBar::new(value.clamp(0.0, 1.0))
                    .desired_width(160.0)
                    .text(label),
            );
        }
        ui.label(format!("valence: {:.2}", state.valence));
        ui.label(format!("arousal: {:.2}", state.arousal));
        ui.label(format!("growth: {:.2}", state.growth));

        if let Some(params) = self.pipeline.last_parameters() {
            ui.label(format!(
                "feed {:.4} · kill {:.4}",
                params.simulation.feed, params.simulation.kill
            ));
        }
        ui.label(format!(
            "mean V: {:.4} · steps: {}",
            self.pipeline.engine().current().mean_v(),
            self.pipeline.engine().steps()
        ));

        ui.separator();
        if let Some(audio) = &self.audio {
            ui.label(format!("Input device: {}", audio.device_name));
            ui.label(format!("Sample rate: {} Hz", audio.sample_rate));
        } else if let Some(err) = &self.audio_error {
            ui.colored_label(
                egui::Color32::from_rgb(230, 100, 100),
                format!("Audio offline: {err}"),
            );
        }
        ui.small("H: HUD · ←/→: symmetry · 1/2/3: mode");
    }

    fn draw_visuals(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let width = available.x.max(1.0).round() as usize;
        let height = available.y.max(1.0).round() as usize;
        self.pipeline.resize(width, height);

        let Some(texture) = &self.texture else {
            return;
        };
        let response = ui.add(
            egui::Image::new((texture.id(), available)).sense(egui::Sense::click_and_drag()),
        );

        let rect = response.rect;
        let square = rect.width().min(rect.height()).max(1.0);
        let position = response
            .interact_pointer_pos()
            .filter(|_| response.is_pointer_button_down_on())
            .map(|pos| {
                [
                    (pos.x - rect.center().x) / square + 0.5,
                    (pos.y - rect.center().y) / square + 0.5,
                ]
            })
            .filter(|[u, v]| (0.0..=1.0).contains(u) && (0.0..=1.0).contains(v));

        self.pipeline.set_pointer(PointerInput {
            position,
            active: position.is_some(),
        });
    }
}

impl eframe::App for MandalaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        if !self.paused {
            let dt = ctx.input(|i| i.stable_dt).min(MAX_FRAME_DT);
            let raw = self.sensors.poll();
            self.pipeline.tick(raw, dt);
        }
        self.update_texture(ctx);

        if self.show_hud {
            egui::SidePanel::left("controls")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            self.draw_controls(ui);
                        });
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::from_gray(3)))
            .show(ctx, |ui| {
                self.draw_visuals(ui);
            });

        ctx.request_repaint();
    }
}
