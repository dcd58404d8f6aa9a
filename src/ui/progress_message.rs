/// Events sent from the loader to the progress display
#[derive(Clone, Debug)]
pub enum ProgressMessage {
    TableStarted {
        table: String,
        total: usize,
    },
    Progress {
        table: String,
        current: usize,
    },
    TableFinished {
        table: String,
        ok: bool,
    },
    Error(String),
    Exit,
}
