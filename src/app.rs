//! Main application logic and orchestration

use crate::audio::CpalAnalyzer;
use crate::config::Config;
use crate::control::{ControlContext, ControlLoop, TickReport};
use crate::error::{AppError, AppResult};
use crate::mixer::{SinkVolumeController, SubstringMatcher};
use crate::pulse::PactlMixer;
use crate::scheduler::{TickDecision, TickLimiter};
use crate::smoothing::RunningAverage;
use crate::spectrum::SpectralSource;
use crate::ui;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type MonitorTerminal = Terminal<CrosstermBackend<std::io::Stdout>>;

/// Main application struct
pub struct App {
    config: Config,
    terminal: Option<MonitorTerminal>,
}

/// Exit codes for the application
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    UserExit = 1, // User pressed Escape or Ctrl+C
    Error = 2,    // Actual application error
}

/// Result type that includes user exit information
pub type AppRunResult = Result<(), AppError>;

/// Extended result that tracks exit reason
pub struct RunResult {
    pub result: AppRunResult,
    pub exit_code: ExitCode,
}

impl RunResult {
    fn error(err: AppError) -> Self {
        RunResult {
            result: Err(err),
            exit_code: ExitCode::Error,
        }
    }
}

/// Logs each distinct per-tick error once until it changes or clears
#[derive(Default)]
struct ErrorLatch {
    last: Option<String>,
}

impl ErrorLatch {
    fn report(&mut self, err: &AppError) -> String {
        let message = err.to_string();
        if self.last.as_deref() != Some(message.as_str()) {
            warn!("{}", message);
            self.last = Some(message.clone());
        }
        message
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

impl App {
    /// Initialize the application with configuration
    pub fn new_with_config(config: Config) -> AppResult<Self> {
        let terminal = if config.monitor {
            enable_raw_mode()?;
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
            let backend = CrosstermBackend::new(stdout);
            Some(Terminal::new(backend)?)
        } else {
            None
        };

        Ok(App { config, terminal })
    }

    /// Run the control loop until Ctrl+C or Escape
    pub async fn run(mut self) -> RunResult {
        let analyzer = match CpalAnalyzer::start(&self.config.analyzer) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                let _ = self.cleanup();
                return RunResult::error(e);
            }
        };
        let device_name = analyzer.name().to_string();

        let matcher = SubstringMatcher::new(
            self.config.digital_marker.clone(),
            self.config.standard_marker.clone(),
        );
        let controller = SinkVolumeController::new(PactlMixer::new(), Box::new(matcher));
        let mut control = ControlLoop::new(
            analyzer,
            self.config.band,
            crate::state::StateClassifier::new(self.config.thresholds),
            controller,
            self.config.warmup_ticks,
        );
        let mut ctx = ControlContext::new(
            self.config.initial_state,
            RunningAverage::for_duration(self.config.ticks_per_second, self.config.window_seconds),
        );

        debug!(
            height = self.config.display.height,
            window_ratio = self.config.display.window_ratio,
            frequency_bins = self.config.analyzer.frequency_bins,
            "Display settings"
        );
        info!(
            band = ?self.config.band,
            thresholds = ?self.config.thresholds,
            window = ctx.window.capacity(),
            "Listening for marker tone"
        );

        let mut errors = ErrorLatch::default();
        let mut status = match control.enforce(ctx.state) {
            Ok(_) => format!("Started in {}", ctx.state),
            Err(e) => errors.report(&e),
        };

        let mut limiter = TickLimiter::new(self.config.ticks_per_second, Instant::now());
        let mut last_stats = Instant::now();
        let mut last_report: Option<TickReport> = None;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let exit_reason = loop {
            let pause = match limiter.poll(Instant::now()) {
                TickDecision::Wait(remaining) => remaining,
                TickDecision::Due => {
                    match control.tick(&mut ctx) {
                        Ok(report) => {
                            errors.clear();
                            if let Some(state) = report.transition {
                                status = format!("Switched to {}", state);
                            }
                            last_report = Some(report);
                        }
                        Err(e) => status = errors.report(&e),
                    }

                    if let Some(report) = &last_report
                        && last_stats.elapsed() >= Duration::from_secs(1)
                    {
                        debug!(
                            average = report.average,
                            band_energy = report.band_energy,
                            primed = report.primed,
                            classified = ?report.classified,
                            state = %ctx.state,
                            ticks = ctx.ticks,
                            "Running average"
                        );
                        last_stats = Instant::now();
                    }

                    if let Err(e) = self.draw(&device_name, &status, &ctx, last_report.as_ref()) {
                        let _ = self.cleanup();
                        return RunResult::error(e);
                    }
                    if self.escape_pressed() {
                        break ExitCode::UserExit;
                    }

                    Duration::ZERO
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received Ctrl+C, shutting down");
                    break ExitCode::UserExit;
                }
                _ = self.config.idle.idle(pause) => {}
            }
        };

        // Releases the capture stream before the terminal is restored
        drop(control);
        let _ = self.cleanup(); // Ignore cleanup errors

        RunResult {
            result: Ok(()),
            exit_code: exit_reason,
        }
    }

    /// Redraw the monitor screen, if enabled
    fn draw(
        &mut self,
        device_name: &str,
        status: &str,
        ctx: &ControlContext,
        report: Option<&TickReport>,
    ) -> AppResult<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };

        let ui_state = ui::UiState {
            device_name: device_name.to_string(),
            status: status.to_string(),
            routing: ctx.state,
            average: report.map_or(0.0, |r| r.average),
            band_energy: report.map_or(0.0, |r| r.band_energy),
            thresholds: self.config.thresholds,
            fill: ctx.window.pushed() as f64 / ctx.window.capacity() as f64,
        };
        terminal.draw(|f| ui::render_ui(f, &ui_state))?;
        Ok(())
    }

    /// Check for Escape or Ctrl+C typed into the monitor screen
    fn escape_pressed(&self) -> bool {
        if self.terminal.is_none() {
            return false;
        }
        if crossterm::event::poll(Duration::from_millis(0)).unwrap_or(false)
            && let Ok(Event::Key(key_event)) = crossterm::event::read()
        {
            return match key_event.code {
                KeyCode::Esc => true,
                KeyCode::Char('c') => key_event
                    .modifiers
                    .contains(crossterm::event::KeyModifiers::CONTROL),
                _ => false,
            };
        }
        false
    }

    /// Clean up terminal state
    fn cleanup(&mut self) -> AppResult<()> {
        if let Some(mut terminal) = self.terminal.take() {
            disable_raw_mode()?;
            execute!(
                terminal.backend_mut(),
                LeaveAlternateScreen,
                DisableMouseCapture
            )?;
            terminal.show_cursor()?;
        }
        Ok(())
    }
}
