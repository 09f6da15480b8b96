use crate::config::{Config, DecodeMode};
use crate::debug_if_enabled;
use crate::events::{KeyDecision, KeyEvent, KeyState};
use crate::services::keyboard_listener::ModifierState;
use crate::services::virtual_device::InputInjector;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

use super::state::MorseState;
use super::table::{self, Symbol};

/// Итог одного опроса монитора таймаутов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PollOutcome {
    /// Распознанная буква/цифра; None - неизвестный код, молча отброшен
    ch: Option<char>,
    /// Пауза достигла границы слова - после буквы печатается пробел
    word_gap: bool,
}

/// Движок сегментации Морзе: классифицирует перехваченные события в
/// точки/тире, копит их в буфере под одним мьютексом и коммитит буквы
/// по паузам (монитор таймаутов) либо по явной клавише коммита.
pub struct MorseEngine {
    config: Arc<Config>,
    injector: Arc<dyn InputInjector>,
    modifier_state: Arc<RwLock<ModifierState>>,
    running: Arc<AtomicBool>,
    state: Mutex<MorseState>,
}

impl MorseEngine {
    pub fn new(
        config: Arc<Config>,
        injector: Arc<dyn InputInjector>,
        modifier_state: Arc<RwLock<ModifierState>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        info!(
            "Инициализация MorseEngine (режим: {}, letter: {} мс, word: {} мс)",
            config.decode.mode, config.decode.letter_timeout_ms, config.decode.word_timeout_ms
        );

        Self {
            config,
            injector,
            modifier_state,
            running,
            state: Mutex::new(MorseState::new()),
        }
    }

    /// Решение по одному перехваченному событию. Вызывается синхронно из
    /// цикла чтения устройства, поэтому здесь только классификация и
    /// добавление в буфер; вся медленная работа живёт на пути коммита.
    pub fn handle_key_event(&self, event: &KeyEvent) -> KeyDecision {
        let keys = self.config.resolved();

        // Клавиша выхода не поглощается - приложение с фокусом получает её
        if event.key_code == keys.exit {
            if event.state == KeyState::Pressed {
                info!("Нажата клавиша выхода, останавливаем сервисы");
                self.running.store(false, Ordering::SeqCst);
            }
            return KeyDecision::PassThrough;
        }

        // Клавиша немедленного коммита поглощается на обоих переходах,
        // чтобы не сработать как модификатор в приложении
        if Some(event.key_code) == keys.commit {
            if event.state == KeyState::Released {
                debug_if_enabled!("Явный коммит по {}", event.key_code);
                self.commit_now();
            }
            return KeyDecision::Absorb;
        }

        if event.key_code == keys.dot || event.key_code == keys.dash {
            match event.state {
                KeyState::Pressed => {
                    if keys.mode == DecodeMode::Duration {
                        self.state.lock().record_down(event.key_code, event.timestamp);
                    }
                }
                KeyState::Released => {
                    let mut st = self.state.lock();
                    let symbol = match keys.mode {
                        DecodeMode::Tap => {
                            if event.key_code == keys.dot {
                                Symbol::Dot
                            } else {
                                Symbol::Dash
                            }
                        }
                        DecodeMode::Duration => match st.take_down(event.key_code) {
                            Some(down) => {
                                let held = event.timestamp.duration_since(down);
                                if held < self.config.dash_threshold() {
                                    Symbol::Dot
                                } else {
                                    Symbol::Dash
                                }
                            }
                            // keydown не был зафиксирован (пришёл до установки
                            // перехвата) - по умолчанию точка, не ошибка
                            None => Symbol::Dot,
                        },
                    };
                    st.append(symbol, event.timestamp);
                    debug_if_enabled!("Символ {:?} добавлен в буфер", symbol);
                }
                KeyState::Repeat => {
                    // Аппаратные повторы поглощаем без символа
                    debug_if_enabled!("Игнорируем аппаратный повтор для {}", event.key_code);
                }
            }
            return KeyDecision::Absorb;
        }

        KeyDecision::PassThrough
    }

    /// Немедленный коммит буфера (клавиша явного коммита). Пустой буфер -
    /// no-op; отметка активности не трогается, монитор на следующем опросе
    /// просто увидит пустой буфер.
    fn commit_now(&self) {
        let decoded = {
            let mut st = self.state.lock();
            if st.is_empty() {
                return;
            }
            self.decode_drained(&mut st)
        };

        if let Some(ch) = decoded {
            let ch = self.resolve_case(ch);
            if let Err(e) = self.injector.inject_char(ch) {
                error!("Не удалось напечатать символ {:?}: {}", ch, e);
            }
        }
    }

    /// Одна итерация монитора: сравнить простой буфера с порогами буквы и
    /// слова. Буфер очищается независимо от результата поиска в таблице.
    fn poll(&self) -> Option<PollOutcome> {
        let (decoded, word_gap) = {
            let mut st = self.state.lock();
            let last = st.last_activity?;
            if st.is_empty() {
                return None;
            }

            let gap = last.elapsed();
            if gap < self.config.letter_timeout() {
                return None;
            }

            let word_gap = gap >= self.config.word_timeout();
            let decoded = self.decode_drained(&mut st);
            st.last_activity = None;
            (decoded, word_gap)
        };

        // Регистр определяется состоянием модификаторов в момент коммита
        let ch = decoded.map(|c| self.resolve_case(c));
        Some(PollOutcome { ch, word_gap })
    }

    /// Забрать код из буфера и найти его в таблице; вызывается под мьютексом
    fn decode_drained(&self, st: &mut MorseState) -> Option<char> {
        let code = st.drain_code();
        let decoded = table::lookup(&code);
        if decoded.is_none() {
            debug_if_enabled!("Неизвестный код '{}' отброшен", code);
        }
        decoded
    }

    /// uppercase = CapsLock XOR Shift; применяется только к буквам
    fn resolve_case(&self, ch: char) -> char {
        if !ch.is_ascii_alphabetic() {
            return ch;
        }

        let modifiers = self.modifier_state.read();
        let uppercase = modifiers.caps_lock_on() ^ modifiers.shift_pressed();

        if uppercase {
            ch.to_ascii_uppercase()
        } else {
            ch.to_ascii_lowercase()
        }
    }

    /// Инъекция результата коммита; выполняется после освобождения мьютекса
    fn emit(&self, outcome: PollOutcome) {
        if let Some(ch) = outcome.ch {
            debug_if_enabled!("Коммит буквы {:?}", ch);
            if let Err(e) = self.injector.inject_char(ch) {
                error!("Не удалось напечатать символ {:?}: {}", ch, e);
            }
        }

        // Пробел по границе слова печатается и при неизвестном коде
        if outcome.word_gap {
            if let Err(e) = self.injector.inject_char(' ') {
                error!("Не удалось напечатать пробел: {}", e);
            }
        }
    }

    /// Монитор таймаутов: фоновый цикл с фиксированным интервалом опроса.
    /// Завершается кооперативно по флагу running; недобранная буква при
    /// остановке отбрасывается, не коммитится.
    pub async fn run_monitor(self: Arc<Self>) {
        info!(
            "Монитор таймаутов запущен (интервал {} мс)",
            self.config.decode.poll_interval_ms
        );

        while self.running.load(Ordering::SeqCst) {
            sleep(self.config.poll_interval()).await;

            if let Some(outcome) = self.poll() {
                self.emit(outcome);
            }
        }

        info!("Монитор таймаутов остановлен, незавершённая буква отброшена");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::{KeyCode, VirtualKeyEvent};
    use std::time::{Duration, Instant};

    const DOT_KEY: u16 = 52; // period
    const DASH_KEY: u16 = 12; // minus
    const COMMIT_KEY: u16 = 29; // leftctrl
    const EXIT_KEY: u16 = 1; // esc
    const OTHER_KEY: u16 = 30; // a

    /// Инжектор, записывающий напечатанное для проверок
    #[derive(Default)]
    struct RecordingInjector {
        typed: Mutex<String>,
        forwarded: Mutex<Vec<VirtualKeyEvent>>,
    }

    impl RecordingInjector {
        fn typed(&self) -> String {
            self.typed.lock().clone()
        }
    }

    impl InputInjector for RecordingInjector {
        fn inject_char(&self, ch: char) -> Result<()> {
            self.typed.lock().push(ch);
            Ok(())
        }

        fn forward_key(&self, event: VirtualKeyEvent) -> Result<()> {
            self.forwarded.lock().push(event);
            Ok(())
        }
    }

    struct Harness {
        engine: MorseEngine,
        injector: Arc<RecordingInjector>,
        modifier_state: Arc<RwLock<ModifierState>>,
        running: Arc<AtomicBool>,
    }

    fn harness(mode: &str) -> Harness {
        let mut config = Config::default();
        config.decode.mode = mode.to_string();
        config.resolve_keys().unwrap();
        let config = Arc::new(config);

        let injector = Arc::new(RecordingInjector::default());
        let modifier_state = Arc::new(RwLock::new(ModifierState::new()));
        let running = Arc::new(AtomicBool::new(true));

        let engine = MorseEngine::new(
            config,
            injector.clone() as Arc<dyn InputInjector>,
            modifier_state.clone(),
            running.clone(),
        );

        Harness {
            engine,
            injector,
            modifier_state,
            running,
        }
    }

    fn event(code: u16, state: KeyState) -> KeyEvent {
        KeyEvent::new(KeyCode::new(code), state, "test".to_string())
    }

    fn event_at(code: u16, state: KeyState, timestamp: Instant) -> KeyEvent {
        KeyEvent {
            key_code: KeyCode::new(code),
            state,
            timestamp,
            device_name: "test".to_string(),
        }
    }

    /// Нажатие+отпускание обозначенной клавиши; оба перехода поглощаются
    fn tap(h: &Harness, code: u16) {
        assert_eq!(
            h.engine.handle_key_event(&event(code, KeyState::Pressed)),
            KeyDecision::Absorb
        );
        assert_eq!(
            h.engine.handle_key_event(&event(code, KeyState::Released)),
            KeyDecision::Absorb
        );
    }

    /// Состарить отметку активности, имитируя паузу заданной длины
    fn backdate(h: &Harness, gap: Duration) {
        let mut st = h.engine.state.lock();
        st.last_activity = Some(Instant::now() - gap);
    }

    fn poll_and_emit(h: &Harness) -> Option<PollOutcome> {
        let outcome = h.engine.poll();
        if let Some(outcome) = outcome {
            h.engine.emit(outcome);
        }
        outcome
    }

    #[test]
    fn test_tap_identity_decodes_letter_after_letter_gap() {
        let h = harness("tap");

        // ".." с паузой длины буквы → 'i' без пробела
        tap(&h, DOT_KEY);
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(700));

        let outcome = poll_and_emit(&h).unwrap();
        assert_eq!(outcome.ch, Some('i'));
        assert!(!outcome.word_gap);
        assert_eq!(h.injector.typed(), "i");
    }

    #[test]
    fn test_word_gap_appends_space() {
        let h = harness("tap");

        // "." с паузой длины слова → "e "
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(1400));

        let outcome = poll_and_emit(&h).unwrap();
        assert_eq!(outcome.ch, Some('e'));
        assert!(outcome.word_gap);
        assert_eq!(h.injector.typed(), "e ");
    }

    #[test]
    fn test_gap_below_letter_timeout_keeps_accumulating() {
        let h = harness("tap");

        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(600));

        assert_eq!(h.engine.poll(), None);
        assert!(!h.engine.state.lock().is_empty());
        assert_eq!(h.injector.typed(), "");
    }

    #[test]
    fn test_idle_commit_is_idempotent() {
        let h = harness("tap");

        tap(&h, DASH_KEY);
        backdate(&h, Duration::from_millis(700));

        assert!(poll_and_emit(&h).is_some());
        assert_eq!(h.injector.typed(), "t");

        // Повторный опрос без новых символов ничего не делает
        assert_eq!(h.engine.poll(), None);
        assert_eq!(h.injector.typed(), "t");
        assert!(h.engine.state.lock().is_empty());
    }

    #[test]
    fn test_unknown_code_discarded_silently() {
        let h = harness("tap");

        // Шесть точек не входят в таблицу
        for _ in 0..6 {
            tap(&h, DOT_KEY);
        }
        backdate(&h, Duration::from_millis(700));

        let outcome = poll_and_emit(&h).unwrap();
        assert_eq!(outcome.ch, None);
        assert_eq!(h.injector.typed(), "");
        assert!(h.engine.state.lock().is_empty());
    }

    #[test]
    fn test_unknown_code_at_word_gap_still_emits_space() {
        let h = harness("tap");

        for _ in 0..6 {
            tap(&h, DOT_KEY);
        }
        backdate(&h, Duration::from_millis(1400));

        let outcome = poll_and_emit(&h).unwrap();
        assert_eq!(outcome.ch, None);
        assert!(outcome.word_gap);
        assert_eq!(h.injector.typed(), " ");
    }

    #[test]
    fn test_case_resolution_xor_law() {
        // CapsLock off, Shift off → строчная
        let h = harness("tap");
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(700));
        poll_and_emit(&h);
        assert_eq!(h.injector.typed(), "e");

        // CapsLock on, Shift off → заглавная
        let h = harness("tap");
        h.modifier_state.write().update_key(58, KeyState::Pressed); // capslock
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(700));
        poll_and_emit(&h);
        assert_eq!(h.injector.typed(), "E");

        // CapsLock on, Shift held → снова строчная (XOR)
        let h = harness("tap");
        h.modifier_state.write().update_key(58, KeyState::Pressed);
        h.modifier_state.write().update_key(42, KeyState::Pressed); // leftshift
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(700));
        poll_and_emit(&h);
        assert_eq!(h.injector.typed(), "e");
    }

    #[test]
    fn test_digits_unaffected_by_modifiers() {
        let h = harness("tap");
        h.modifier_state.write().update_key(58, KeyState::Pressed);

        // "--..." → '7'
        tap(&h, DASH_KEY);
        tap(&h, DASH_KEY);
        tap(&h, DOT_KEY);
        tap(&h, DOT_KEY);
        tap(&h, DOT_KEY);
        backdate(&h, Duration::from_millis(700));
        poll_and_emit(&h);

        assert_eq!(h.injector.typed(), "7");
    }

    #[test]
    fn test_explicit_commit_bypasses_timeout() {
        let h = harness("tap");

        // "---" и клавиша коммита → 'o' сразу, без ожидания паузы
        tap(&h, DASH_KEY);
        tap(&h, DASH_KEY);
        tap(&h, DASH_KEY);

        assert_eq!(
            h.engine.handle_key_event(&event(COMMIT_KEY, KeyState::Pressed)),
            KeyDecision::Absorb
        );
        assert_eq!(
            h.engine.handle_key_event(&event(COMMIT_KEY, KeyState::Released)),
            KeyDecision::Absorb
        );

        assert_eq!(h.injector.typed(), "o");

        // Монитор на следующем опросе находит пустой буфер
        assert_eq!(h.engine.poll(), None);
        assert_eq!(h.injector.typed(), "o");
    }

    #[test]
    fn test_explicit_commit_on_empty_buffer_is_noop() {
        let h = harness("tap");

        assert_eq!(
            h.engine.handle_key_event(&event(COMMIT_KEY, KeyState::Released)),
            KeyDecision::Absorb
        );
        assert_eq!(h.injector.typed(), "");
    }

    #[test]
    fn test_duration_mode_classifies_by_hold_time() {
        let h = harness("duration");
        let base = Instant::now();

        // Короткое удержание (100 мс < 300) → точка
        h.engine
            .handle_key_event(&event_at(DOT_KEY, KeyState::Pressed, base));
        h.engine.handle_key_event(&event_at(
            DOT_KEY,
            KeyState::Released,
            base + Duration::from_millis(100),
        ));

        // Долгое удержание (400 мс ≥ 300) → тире, даже на клавише точки
        h.engine.handle_key_event(&event_at(
            DOT_KEY,
            KeyState::Pressed,
            base + Duration::from_millis(200),
        ));
        h.engine.handle_key_event(&event_at(
            DOT_KEY,
            KeyState::Released,
            base + Duration::from_millis(600),
        ));

        backdate(&h, Duration::from_millis(700));
        let outcome = poll_and_emit(&h).unwrap();

        // ".-" → 'a'
        assert_eq!(outcome.ch, Some('a'));
        assert_eq!(h.injector.typed(), "a");
    }

    #[test]
    fn test_duration_mode_missing_keydown_defaults_to_dot() {
        let h = harness("duration");

        // keyup без зафиксированного keydown → точка
        assert_eq!(
            h.engine.handle_key_event(&event(DASH_KEY, KeyState::Released)),
            KeyDecision::Absorb
        );

        backdate(&h, Duration::from_millis(700));
        let outcome = poll_and_emit(&h).unwrap();
        assert_eq!(outcome.ch, Some('e'));
    }

    #[test]
    fn test_repeat_events_absorbed_without_symbol() {
        let h = harness("tap");

        assert_eq!(
            h.engine.handle_key_event(&event(DOT_KEY, KeyState::Repeat)),
            KeyDecision::Absorb
        );
        assert!(h.engine.state.lock().is_empty());
    }

    #[test]
    fn test_exit_key_clears_running_flag_and_passes_through() {
        let h = harness("tap");
        assert!(h.running.load(Ordering::SeqCst));

        assert_eq!(
            h.engine.handle_key_event(&event(EXIT_KEY, KeyState::Pressed)),
            KeyDecision::PassThrough
        );
        assert!(!h.running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unrelated_keys_pass_through() {
        let h = harness("tap");

        assert_eq!(
            h.engine.handle_key_event(&event(OTHER_KEY, KeyState::Pressed)),
            KeyDecision::PassThrough
        );
        assert_eq!(
            h.engine.handle_key_event(&event(OTHER_KEY, KeyState::Released)),
            KeyDecision::PassThrough
        );
        assert!(h.engine.state.lock().is_empty());
    }
}
