mod held;
mod posts;
mod queue;
mod reply_state;
mod status;
