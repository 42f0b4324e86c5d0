use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use rodio::{OutputStream, Sink, Source, source::SineWave};

use crate::error::Error;
use crate::framebuffer::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::machine::{HostInput, Machine, NUM_KEYS};

pub const DEFAULT_CLOCK_HZ: u64 = 60;

const BEEP_FREQUENCY: f32 = 440.0;

/// Physical-to-logical key translation, the classic 4x4 arrangement:
/// 1234 / QWER / ASDF / ZXCV map onto the hex pad's 123C / 456D / 789E / A0BF.
#[rustfmt::skip]
const KEY_BINDINGS: [(char, u8); NUM_KEYS] = [
    ('1', 0x1), ('2', 0x2), ('3', 0x3), ('4', 0xC),
    ('q', 0x4), ('w', 0x5), ('e', 0x6), ('r', 0xD),
    ('a', 0x7), ('s', 0x8), ('d', 0x9), ('f', 0xE),
    ('z', 0xA), ('x', 0x0), ('c', 0xB), ('v', 0xF),
];

pub struct Settings {
    /// Machine steps per second. 60 matches the timer decrement rate of the
    /// original hardware.
    pub clock_hz: u64,
    pub rom: PathBuf,
}

/// Keyboard collaborator backed by crossterm events.
///
/// Terminals surface no key-up events, so a pressed key counts as held for
/// the following machine step and is released when the frame ends.
pub struct TerminalKeypad {
    bindings: [(char, u8); NUM_KEYS],
    held: [bool; NUM_KEYS],
}

impl TerminalKeypad {
    pub fn new(bindings: [(char, u8); NUM_KEYS]) -> Self {
        TerminalKeypad {
            bindings,
            held: [false; NUM_KEYS],
        }
    }

    pub fn press(&mut self, physical: char) {
        if let Some(&(_, key)) = self.bindings.iter().find(|&&(c, _)| c == physical) {
            self.held[usize::from(key)] = true;
        }
    }

    pub fn release_all(&mut self) {
        self.held = [false; NUM_KEYS];
    }
}

impl HostInput for TerminalKeypad {
    fn is_key_pressed(&self, key: u8) -> bool {
        self.held.get(usize::from(key)).copied().unwrap_or(false)
    }
}

/// Sine-wave beeper driven by the machine's sound timer edge.
pub struct Beeper {
    sink: Sink,
    #[allow(dead_code)]
    stream: OutputStream,
}

impl Beeper {
    pub fn new(freq: f32) -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        let source = SineWave::new(freq).repeat_infinite();

        sink.append(source);
        sink.pause();

        Ok(Self { sink, stream })
    }

    pub fn set_active(&self, on: bool) {
        if on {
            self.sink.play();
        } else {
            self.sink.pause();
        }
    }
}

/// Terminal front end: owns the machine and the host-side collaborators and
/// drives the step cycle at a fixed cadence.
pub struct Emulator {
    machine: Machine,
    keypad: TerminalKeypad,
    beeper: Beeper,
    settings: Settings,
}

impl Emulator {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        Ok(Emulator {
            machine: Machine::new(),
            keypad: TerminalKeypad::new(KEY_BINDINGS),
            beeper: Beeper::new(BEEP_FREQUENCY)?,
            settings,
        })
    }

    fn render(&self, frame: &mut ratatui::Frame, rom_name: &str) {
        let game_width = (DISPLAY_WIDTH as u16) + 2; // borders
        let game_height = (DISPLAY_HEIGHT as u16) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(game_height),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(frame.area());

        // Center the game horizontally if the terminal is wider than needed.
        let game_area = if chunks[0].width > game_width {
            let horizontal = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Min(0),
                    Constraint::Length(game_width),
                    Constraint::Min(0),
                ])
                .split(chunks[0]);
            horizontal[1]
        } else {
            chunks[0]
        };

        let mut rows = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                rows.push(if self.machine.framebuffer.pixel(x, y).unwrap_or(false) {
                    '█'
                } else {
                    ' '
                });
            }
            rows.push('\n');
        }
        let game = Paragraph::new(rows)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(rom_name.to_string()),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(game, game_area);

        let key_help = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";
        let keys = Paragraph::new(key_help)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Keypad"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(keys, chunks[1]);
    }

    /// Load the configured ROM and run the machine until Esc is pressed, a
    /// fatal machine error occurs, or an unimplemented opcode halts it.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let rom_name: String = self
            .settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());
        let image = std::fs::read(&self.settings.rom)?;
        self.machine.load(&image)?;

        let tick = Duration::from_secs_f64(1.0 / self.settings.clock_hz as f64);

        enable_raw_mode()?;
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        'mainloop: loop {
            let tick_start = Instant::now();

            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Esc => {
                            terminal.clear()?;
                            break 'mainloop;
                        }
                        KeyCode::Char(c) => self.keypad.press(c.to_ascii_lowercase()),
                        _ => {}
                    }
                }
            }

            match self.machine.step(&self.keypad) {
                Ok(output) => self.beeper.set_active(output.beep),
                Err(Error::UnimplementedOpcode(word)) => {
                    // The machine leaves pc on the unknown word; retrying
                    // would spin forever, so halt and tell the user.
                    log::warn!(
                        "halting on unimplemented opcode {:#06X} at {:#05X}",
                        word,
                        self.machine.pc
                    );
                    terminal.clear()?;
                    break 'mainloop;
                }
                Err(err) => {
                    disable_raw_mode()?;
                    return Err(err.into());
                }
            }

            terminal.draw(|frame| self.render(frame, &rom_name))?;
            self.keypad.release_all();

            let elapsed = tick_start.elapsed();
            if elapsed < tick {
                std::thread::sleep(tick - elapsed);
            }
        }
        disable_raw_mode()?;

        Ok(())
    }
}
