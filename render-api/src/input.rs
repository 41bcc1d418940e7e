//! Input events forwarded from the host window to the Renderer.
//! Backend-agnostic: the host maps its windowing library's key codes to these.

/// Keys the demos react to. Everything else arrives as `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Space,
    G,
    T,
    O,
    B,
    P,
    V,
    Digit1,
    Digit2,
    Digit3,
    BracketLeft,
    BracketRight,
    Minus,
    Equal,
    F,
    Tab,
    Comma,
    Period,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Escape,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}
