mod job;
mod state;

pub use job::{
    Job, JobStatus, Outcome, PollConfig, PollObservation, ProcessingSummary, RunReport,
};
pub use state::{PollResult, StatusMachine, Transition};
