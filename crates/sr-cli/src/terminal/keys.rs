//! Keyboard events to shell input

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press means to the running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Bytes for the remote shell
    Send(Vec<u8>),
    /// Close the session (Ctrl+])
    Close,
    /// Nothing to do
    Ignore,
}

pub fn map_key(event: KeyEvent) -> KeyAction {
    if event.kind == KeyEventKind::Release {
        return KeyAction::Ignore;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char(']') {
        return KeyAction::Close;
    }

    let bytes = key_to_bytes(event.code, event.modifiers);
    if bytes.is_empty() {
        KeyAction::Ignore
    } else {
        KeyAction::Send(bytes)
    }
}

/// Encode a key the way an xterm would send it
pub fn key_to_bytes(code: KeyCode, modifiers: KeyModifiers) -> Vec<u8> {
    use KeyCode::*;

    match code {
        Char(c) => {
            if modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+A = 0x01 ... Ctrl+Z = 0x1a
                vec![(c.to_ascii_lowercase() as u8) - b'a' + 1]
            } else if modifiers.contains(KeyModifiers::ALT) {
                let mut bytes = vec![0x1b];
                bytes.extend(c.to_string().into_bytes());
                bytes
            } else {
                c.to_string().into_bytes()
            }
        }
        Enter => vec![b'\r'],
        Tab => vec![b'\t'],
        BackTab => vec![0x1b, b'[', b'Z'],
        Backspace => vec![0x7f],
        Esc => vec![0x1b],
        Up => vec![0x1b, b'[', b'A'],
        Down => vec![0x1b, b'[', b'B'],
        Right => vec![0x1b, b'[', b'C'],
        Left => vec![0x1b, b'[', b'D'],
        Home => vec![0x1b, b'[', b'H'],
        End => vec![0x1b, b'[', b'F'],
        PageUp => vec![0x1b, b'[', b'5', b'~'],
        PageDown => vec![0x1b, b'[', b'6', b'~'],
        Delete => vec![0x1b, b'[', b'3', b'~'],
        Insert => vec![0x1b, b'[', b'2', b'~'],
        F(n) => match n {
            1 => vec![0x1b, b'O', b'P'],
            2 => vec![0x1b, b'O', b'Q'],
            3 => vec![0x1b, b'O', b'R'],
            4 => vec![0x1b, b'O', b'S'],
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => vec![],
        },
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_ctrl_bracket_closes() {
        assert_eq!(
            map_key(press(KeyCode::Char(']'), KeyModifiers::CONTROL)),
            KeyAction::Close
        );
    }

    #[test]
    fn test_control_and_plain_keys() {
        assert_eq!(key_to_bytes(KeyCode::Char('c'), KeyModifiers::CONTROL), vec![0x03]);
        assert_eq!(key_to_bytes(KeyCode::Char('D'), KeyModifiers::CONTROL), vec![0x04]);
        assert_eq!(key_to_bytes(KeyCode::Char('é'), KeyModifiers::NONE), "é".as_bytes());
        assert_eq!(key_to_bytes(KeyCode::Char('x'), KeyModifiers::ALT), vec![0x1b, b'x']);
        assert_eq!(key_to_bytes(KeyCode::Enter, KeyModifiers::NONE), vec![b'\r']);
        assert_eq!(key_to_bytes(KeyCode::F(5), KeyModifiers::NONE), b"\x1b[15~");
    }

    #[test]
    fn test_unmapped_keys_are_ignored() {
        assert_eq!(
            map_key(press(KeyCode::CapsLock, KeyModifiers::NONE)),
            KeyAction::Ignore
        );
        assert_eq!(
            map_key(press(KeyCode::F(13), KeyModifiers::NONE)),
            KeyAction::Ignore
        );
    }
}
