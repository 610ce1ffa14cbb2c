pub mod catalog;

/// One line of the terminal reveal. Dynamic lines are filled from the
/// environment snapshot captured when the Terminal stage starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineTemplate {
    Fixed(&'static str),
    Platform,
    Battery,
    GpsLock,
}

pub fn builtin_terminal_script() -> Vec<LineTemplate> {
    vec![
        LineTemplate::Fixed("INITIALIZING DAHLIA.OS..."),
        LineTemplate::Fixed("BYPASSING FIREWALL..."),
        LineTemplate::Platform,
        LineTemplate::Battery,
        LineTemplate::Fixed("ACCESSING GPS MODULE..."),
        LineTemplate::GpsLock,
        LineTemplate::Fixed("DOWNLOADING GALLERY..."),
        LineTemplate::Fixed("CONTACTS COPIED..."),
        LineTemplate::Fixed("SYSTEM VULNERABLE."),
        LineTemplate::Fixed("UPLOAD PAUSED. USER INTERVENTION REQUIRED."),
    ]
}
