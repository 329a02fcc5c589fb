//! Database access layer for ava-calls

pub mod calls;
pub mod owners;

pub use calls::{
    delete_call_record, get_call_by_id, get_calls_in_range, get_recent_calls, get_tenant_calls,
    prune_old_calls, scrub_expired_on_read, scrub_transcript_if_expired, sweep_expired_transcripts,
    upsert_calls, UpsertSummary,
};
pub use owners::{
    create_assistant_config, create_user, ensure_tenant, find_config_by_assistant_id,
    find_config_for_user, find_user_by_twilio_number, find_user_for_tenant, first_user,
    get_tenant, get_user,
};
