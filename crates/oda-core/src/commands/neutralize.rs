use std::fmt;

use tracing::{debug, info};

use crate::db::{self, ConnectionDescriptor, SqlConnector, SqlSession};
use crate::error::{OdaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementGroup {
    Identity,
    Integrations,
    SocialTokens,
    ScheduledJobs,
    Watermarks,
}

impl fmt::Display for StatementGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementGroup::Identity => "identity",
            StatementGroup::Integrations => "integrations",
            StatementGroup::SocialTokens => "social tokens",
            StatementGroup::ScheduledJobs => "scheduled jobs",
            StatementGroup::Watermarks => "watermarks",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Statement {
    pub name: &'static str,
    pub group: StatementGroup,
    pub sql: &'static str,
}

const fn stmt(name: &'static str, group: StatementGroup, sql: &'static str) -> Statement {
    Statement { name, group, sql }
}

use StatementGroup::*;

/// Applied to every neutralized copy, in this order. Each statement converges:
/// running it again leaves the same state, except the database UUID and the
/// expiration date, which are renewed on every run.
pub const STATEMENTS: &[Statement] = &[
    stmt(
        "remove_enterprise_code",
        Identity,
        "DELETE FROM ir_config_parameter \
         WHERE key IN ('database.enterprise_code', 'report.url', 'web.base.url.freeze')",
    ),
    stmt(
        "regenerate_database_uuid",
        Identity,
        "UPDATE ir_config_parameter SET value = gen_random_uuid()::text \
         WHERE key = 'database.uuid'",
    ),
    stmt(
        "extend_expiration_date",
        Identity,
        "INSERT INTO ir_config_parameter (key, value, create_uid, create_date, write_uid, write_date) \
         VALUES ('database.expiration_date', (current_date + '3 months'::interval)::timestamp, 1, \
                 current_timestamp, 1, current_timestamp) \
         ON CONFLICT (key) DO UPDATE SET value = (current_date + '3 months'::interval)::timestamp",
    ),
    stmt(
        "disable_bank_sync",
        Integrations,
        "UPDATE account_online_link SET provider_data = '', client_id = 'duplicate'",
    ),
    stmt(
        "disable_fetchmail",
        Integrations,
        "UPDATE fetchmail_server SET active = false",
    ),
    stmt(
        "disable_mail_servers",
        Integrations,
        "DO $$
         BEGIN
             UPDATE ir_mail_server SET active = false;
             IF EXISTS (SELECT 1 FROM ir_module_module
                        WHERE name = 'mail' AND state IN ('installed', 'to upgrade', 'to remove')) THEN
                 UPDATE mail_template SET mail_server_id = NULL;
             END IF;
         EXCEPTION
             WHEN undefined_table OR undefined_column THEN
         END;
         $$",
    ),
    stmt(
        "remove_odoo_sh_logging",
        Integrations,
        "DELETE FROM ir_logging WHERE func = 'odoo.sh'",
    ),
    stmt(
        "disable_prod_delivery_carriers",
        Integrations,
        "UPDATE delivery_carrier SET prod_environment = false",
    ),
    stmt(
        "disable_delivery_carriers",
        Integrations,
        "UPDATE delivery_carrier SET active = false \
         WHERE delivery_type NOT IN ('fixed', 'base_on_rule')",
    ),
    stmt(
        "disable_iap_accounts",
        Integrations,
        r"UPDATE iap_account SET account_token = REGEXP_REPLACE(account_token, '(\+.*)?$', '+disabled')",
    ),
    stmt(
        "unset_mail_template_servers",
        Integrations,
        "UPDATE mail_template SET mail_server_id = NULL",
    ),
    stmt(
        "disable_payment_providers",
        Integrations,
        "UPDATE payment_provider SET state = 'disabled' WHERE state NOT IN ('test', 'disabled')",
    ),
    stmt(
        "remove_website_domains",
        Integrations,
        "UPDATE website SET domain = NULL",
    ),
    stmt(
        "disable_cdn",
        Integrations,
        "UPDATE website SET cdn_activated = false",
    ),
    stmt(
        "remove_ocn_keys",
        Integrations,
        "DELETE FROM ir_config_parameter WHERE key IN ('odoo_ocn.project_id', 'ocn.uuid')",
    ),
    stmt(
        "unset_firebase",
        Integrations,
        "UPDATE website SET firebase_enable_push_notifications = false, \
         firebase_use_own_account = false, firebase_project_id = NULL, \
         firebase_web_api_key = NULL, firebase_push_certificate_key = NULL, \
         firebase_sender_id = NULL",
    ),
    stmt(
        "remove_map_box_token",
        Integrations,
        "DELETE FROM ir_config_parameter WHERE key = 'web_map.token_map_box'",
    ),
    stmt(
        "remove_facebook_tokens",
        SocialTokens,
        "UPDATE social_account SET facebook_account_id = NULL, facebook_access_token = NULL",
    ),
    stmt(
        "remove_instagram_tokens",
        SocialTokens,
        "UPDATE social_account SET instagram_account_id = NULL, \
         instagram_facebook_account_id = NULL, instagram_access_token = NULL",
    ),
    stmt(
        "remove_linkedin_tokens",
        SocialTokens,
        "UPDATE social_account SET linkedin_account_urn = NULL, linkedin_access_token = NULL",
    ),
    stmt(
        "remove_twitter_tokens",
        SocialTokens,
        "UPDATE social_account SET twitter_user_id = NULL, twitter_oauth_token = NULL, \
         twitter_oauth_token_secret = NULL",
    ),
    stmt(
        "remove_youtube_tokens",
        SocialTokens,
        "UPDATE social_account SET youtube_channel_id = NULL, youtube_access_token = NULL, \
         youtube_refresh_token = NULL, youtube_token_expiration_date = NULL, \
         youtube_upload_playlist_id = NULL",
    ),
    stmt(
        "deactivate_crons",
        ScheduledJobs,
        "UPDATE ir_cron SET active = false",
    ),
    // Both reactivations must follow deactivate_crons.
    stmt(
        "activate_autovacuum_cron",
        ScheduledJobs,
        "UPDATE ir_cron SET active = true WHERE id IN \
         (SELECT res_id FROM ir_model_data WHERE name = 'autovacuum_job' AND module = 'base')",
    ),
    stmt(
        "activate_module_update_notification_cron",
        ScheduledJobs,
        "UPDATE ir_cron SET active = true WHERE id IN \
         (SELECT res_id FROM ir_model_data \
          WHERE name = 'ir_cron_module_update_notification' AND module = 'mail')",
    ),
];

/// Applied after [`STATEMENTS`] for full-strength neutralization.
pub const WATERMARK_STATEMENTS: &[Statement] = &[
    stmt(
        "activate_neutralize_banner",
        Watermarks,
        "UPDATE ir_ui_view SET active = true WHERE key = 'web.neutralize_banner'",
    ),
    stmt(
        "activate_neutralize_ribbon",
        Watermarks,
        "UPDATE ir_ui_view SET active = true WHERE key = 'website.neutralize_ribbon'",
    ),
];

/// The ordered batch for one run.
pub fn statements(full_strength: bool) -> impl Iterator<Item = &'static Statement> {
    let watermarks: &'static [Statement] = if full_strength {
        WATERMARK_STATEMENTS
    } else {
        &[]
    };
    STATEMENTS.iter().chain(watermarks.iter())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeutralizeStats {
    pub applied: usize,
    /// Statements skipped because a table or column does not exist.
    pub skipped: Vec<&'static str>,
}

/// Run the batch on an open session. Missing tables or columns skip the
/// statement; any other SQL error aborts the batch.
pub fn neutralize(session: &mut dyn SqlSession, full_strength: bool) -> Result<NeutralizeStats> {
    let mut stats = NeutralizeStats::default();
    for statement in statements(full_strength) {
        match session.execute(statement.sql) {
            Ok(rows) => {
                debug!(statement = statement.name, group = %statement.group, rows, "applied");
                stats.applied += 1;
            }
            Err(e) if e.is_undefined_object() => {
                debug!(statement = statement.name, error = %e, "skipped");
                stats.skipped.push(statement.name);
            }
            Err(source) => {
                return Err(OdaError::Neutralize {
                    statement: statement.name,
                    source,
                })
            }
        }
    }
    info!(
        applied = stats.applied,
        skipped = stats.skipped.len(),
        full_strength,
        "database neutralized"
    );
    Ok(stats)
}

/// Open a session on `conn`, neutralize, and close it.
pub fn run(
    connector: &dyn SqlConnector,
    conn: &ConnectionDescriptor,
    full_strength: bool,
) -> Result<NeutralizeStats> {
    db::with_session(connector, conn, |session| neutralize(session, full_strength))
}
