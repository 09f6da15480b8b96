use crate::events::KeyCode;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::Instant;

use super::table::Symbol;

/// Общее изменяемое состояние движка: буфер символов текущей буквы,
/// отметка последней активности и незакрытые нажатия (duration-режим).
/// Всё состояние живёт под одним мьютексом в MorseEngine; каждая
/// последовательность чтение-изменение выполняется одной критической секцией.
#[derive(Debug, Default)]
pub struct MorseState {
    /// Символы набираемой буквы; коды таблицы не длиннее 5 элементов
    buffer: SmallVec<[Symbol; 8]>,
    /// None — буфер простаивает (сигнальное значение "idle")
    pub last_activity: Option<Instant>,
    /// Момент keydown по коду клавиши; не больше одной записи на клавишу,
    /// повторный keydown до keyup перезаписывает отметку
    pending_down: HashMap<KeyCode, Instant>,
}

impl MorseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить символ и обновить отметку активности (одна операция)
    pub fn append(&mut self, symbol: Symbol, now: Instant) {
        self.buffer.push(symbol);
        self.last_activity = Some(now);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Забрать накопленный код строкой и очистить буфер.
    /// Очистка происходит безусловно, иначе остатки испортили бы
    /// следующую букву.
    pub fn drain_code(&mut self) -> String {
        let code: String = self.buffer.iter().map(Symbol::as_char).collect();
        self.buffer.clear();
        code
    }

    pub fn record_down(&mut self, key: KeyCode, now: Instant) {
        self.pending_down.insert(key, now);
    }

    /// Снять отметку keydown для клавиши; None, если keydown не был
    /// зафиксирован (событие пришло до установки перехвата)
    pub fn take_down(&mut self, key: KeyCode) -> Option<Instant> {
        self.pending_down.remove(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_append_sets_activity() {
        let mut state = MorseState::new();
        assert!(state.is_empty());
        assert!(state.last_activity.is_none());

        let now = Instant::now();
        state.append(Symbol::Dot, now);

        assert!(!state.is_empty());
        assert_eq!(state.last_activity, Some(now));
    }

    #[test]
    fn test_drain_code_clears_buffer() {
        let mut state = MorseState::new();
        let now = Instant::now();
        state.append(Symbol::Dot, now);
        state.append(Symbol::Dash, now);
        state.append(Symbol::Dot, now);

        assert_eq!(state.drain_code(), ".-.");
        assert!(state.is_empty());
        assert_eq!(state.drain_code(), "");
    }

    #[test]
    fn test_pending_down_no_stacking() {
        let mut state = MorseState::new();
        let key = KeyCode::new(52);
        let first = Instant::now();
        let second = first + Duration::from_millis(100);

        state.record_down(key, first);
        // Повторный keydown перезаписывает отметку, не накапливаясь
        state.record_down(key, second);

        assert_eq!(state.take_down(key), Some(second));
        assert_eq!(state.take_down(key), None);
    }
}
