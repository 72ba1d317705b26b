use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::ExtDbError;
use crate::pool::ConnectionPool;
use crate::protocol::{LogForwarder, Protocol, ProtocolKind, SqlOptions, SqlPassThrough};
use crate::reply;
use crate::template::QueryTemplateEngine;

use super::{Extension, clock, lock};

impl Extension {
    /// Mode `9`. Tokens are split on `:`; token 0 is the mode itself.
    pub(super) fn admin(&self, input: &str, limit: usize) -> String {
        let tokens: Vec<&str> = input.split(':').collect();
        let locked = lock(&self.lock_state).locked;
        let handled = self
            .admin_any_state(&tokens, limit)
            .or_else(|| {
                if locked {
                    self.admin_locked(&tokens)
                } else {
                    self.admin_unlocked(&tokens)
                }
            });
        handled.unwrap_or_else(|| {
            error!(input, locked, "invalid administrative command");
            reply::INVALID_FORMAT.to_string()
        })
    }

    /// Commands whose behaviour does not depend on the lock.
    fn admin_any_state(&self, tokens: &[&str], limit: usize) -> Option<String> {
        let reply = match tokens[1..] {
            ["VERSION"] => env!("CARGO_PKG_VERSION").to_string(),
            ["OUTPUTSIZE"] => {
                info!(output_size = limit, "output size queried");
                limit.to_string()
            }
            ["UPTIME", unit] => match clock::uptime_in(self.started.elapsed(), unit) {
                Some(value) => value.to_string(),
                None => invalid_format(unit),
            },
            ["UPTIME2", unit] => match clock::uptime_in(self.started.elapsed(), unit) {
                Some(value) => reply::success(&value.to_string()),
                None => invalid_format(unit),
            },
            ["LOCAL_TIME"] => time_reply(Ok(clock::now_local())),
            ["LOCAL_TIME", offset] => time_reply(clock::apply_offset(clock::now_local(), offset)),
            ["UTC_TIME"] => time_reply(Ok(clock::now_utc())),
            ["UTC_TIME", offset] => time_reply(clock::apply_offset(clock::now_utc(), offset)),
            ["DATEADD", start, delta] => match clock::date_add(start, delta) {
                Ok(at) => reply::success(&clock::date_array(at)),
                Err(err) => {
                    warn!(error = %err, "DATEADD rejected");
                    reply::INVALID_FORMAT.to_string()
                }
            },
            _ => return None,
        };
        Some(reply)
    }

    fn admin_locked(&self, tokens: &[&str]) -> Option<String> {
        let reply = match tokens[1..] {
            ["LOCK_STATUS"] => reply::OK.to_string(),
            ["UNLOCK"] => reply::FAILED.to_string(),
            ["UNLOCK", code] => {
                let mut state = lock(&self.lock_state);
                if state.code.as_deref() == Some(code) {
                    state.locked = false;
                    state.code = None;
                    info!("unlocked");
                    reply::OK.to_string()
                } else {
                    warn!("unlock attempt with wrong code");
                    reply::FAILED.to_string()
                }
            }
            _ => return None,
        };
        Some(reply)
    }

    fn admin_unlocked(&self, tokens: &[&str]) -> Option<String> {
        let reply = match tokens[1..] {
            ["LOCK_STATUS"] => reply::FAILED.to_string(),
            ["UNLOCK"] | ["UNLOCK", _] => reply::OK.to_string(),
            ["LOCK"] => self.set_lock(None),
            ["LOCK", code] => self.set_lock(Some(code)),
            ["RESET"] => {
                if !self.config.allow_reset() {
                    warn!("reset requested but not allowed");
                    return Some(reply::FAILED.to_string());
                }
                match self.reset() {
                    Ok(()) => reply::OK.to_string(),
                    Err(err) => {
                        error!(error = %err, "reset failed");
                        reply::FAILED.to_string()
                    }
                }
            }
            ["ADD_DATABASE", conf] => self.add_database(conf, conf),
            ["ADD_DATABASE", conf, db_id] => self.add_database(conf, db_id),
            ["ADD_PROTOCOL", kind, name] => self.add_protocol(None, kind, name, ""),
            ["ADD_PROTOCOL", kind, name, init] => self.add_protocol(None, kind, name, init),
            ["ADD_DATABASE_PROTOCOL", db_id, kind, name] => {
                self.add_protocol(Some(db_id), kind, name, "")
            }
            ["ADD_DATABASE_PROTOCOL", db_id, kind, name, init] => {
                self.add_protocol(Some(db_id), kind, name, init)
            }
            _ => return None,
        };
        Some(reply)
    }

    fn set_lock(&self, code: Option<&str>) -> String {
        let mut state = lock(&self.lock_state);
        state.locked = true;
        state.code = code.filter(|c| !c.is_empty()).map(str::to_string);
        info!("locked");
        reply::OK.to_string()
    }

    /// `ADD_DATABASE`: open a pool for config section `conf` under `db_id`.
    pub(super) fn add_database(&self, conf: &str, db_id: &str) -> String {
        if self.pools.contains(db_id) {
            warn!(db_id, "already connected to database");
            return reply::ALREADY_CONNECTED.to_string();
        }
        let Some(login) = self.config.database(conf) else {
            warn!(conf, "no such database section");
            return reply::DATABASE_CONFIG_ERROR.to_string();
        };
        let pool = match ConnectionPool::connect(
            db_id,
            login,
            Arc::clone(&self.connector),
            self.pool_settings,
        ) {
            Ok(pool) => pool,
            Err(ExtDbError::ConfigError(message)) => {
                warn!(conf, db_id, error = %message, "database config error");
                return reply::DATABASE_CONFIG_ERROR.to_string();
            }
            Err(err) => {
                warn!(conf, db_id, error = %err, "database connection error");
                return reply::DATABASE_CONNECTION_ERROR.to_string();
            }
        };
        if let Err(err) = self.pools.insert(pool) {
            warn!(db_id, error = %err, "already connected to database");
            return reply::ALREADY_CONNECTED.to_string();
        }
        if let Err(err) = self.ensure_sweeper() {
            error!(error = %err, "pool sweeper could not start");
        }
        info!(conf, db_id, "database added");
        reply::OK.to_string()
    }

    /// `ADD_PROTOCOL` / `ADD_DATABASE_PROTOCOL`.
    pub(super) fn add_protocol(
        &self,
        db_id: Option<&str>,
        kind: &str,
        name: &str,
        init: &str,
    ) -> String {
        if self.protocols.contains(name) {
            warn!(protocol = name, "protocol name already taken");
            return reply::PROTOCOL_NAME_TAKEN.to_string();
        }
        let kind = match kind.parse::<ProtocolKind>() {
            Ok(kind) if kind.needs_database() == db_id.is_some() => kind,
            _ => {
                warn!(kind, db_id, "failed to load unknown protocol");
                return reply::UNKNOWN_PROTOCOL.to_string();
            }
        };
        let protocol = match self.build_protocol(db_id, kind, init) {
            Ok(protocol) => protocol,
            Err(err) => {
                warn!(protocol = name, ?kind, error = %err, "failed to load protocol");
                return reply::FAILED_TO_LOAD_PROTOCOL.to_string();
            }
        };
        match self.protocols.add(name, protocol) {
            Ok(()) => {
                info!(protocol = name, ?kind, db_id, "protocol added");
                reply::OK.to_string()
            }
            Err(err) => {
                warn!(protocol = name, error = %err, "protocol name already taken");
                reply::PROTOCOL_NAME_TAKEN.to_string()
            }
        }
    }

    fn build_protocol(
        &self,
        db_id: Option<&str>,
        kind: ProtocolKind,
        init: &str,
    ) -> Result<Protocol, ExtDbError> {
        let pool = match db_id {
            Some(db_id) => Some(self.pools.get(db_id).ok_or_else(|| {
                ExtDbError::ConfigError(format!("no database connection {db_id}"))
            })?),
            None => None,
        };
        match (kind, pool) {
            (ProtocolKind::Log, _) => Ok(Protocol::Log(LogForwarder::from_init(init)?)),
            (ProtocolKind::Sql, Some(pool)) => Ok(Protocol::Sql(SqlPassThrough::new(
                pool,
                SqlOptions::parse(init),
            ))),
            (ProtocolKind::SqlCustom, Some(pool)) => {
                let source = self.config.call_definitions(init.trim())?;
                let (engine, report) = QueryTemplateEngine::from_source(pool, &source);
                for diagnostic in &report.diagnostics {
                    warn!(definitions = init, "{diagnostic}");
                }
                if !report.ok {
                    return Err(ExtDbError::ConfigError(format!(
                        "definition set {init} failed to load"
                    )));
                }
                info!(
                    definitions = init,
                    calls = engine.calls().len(),
                    "call definitions loaded"
                );
                Ok(Protocol::Custom(engine))
            }
            (_, None) => Err(ExtDbError::ConfigError(
                "protocol requires a database id".into(),
            )),
        }
    }
}

fn invalid_format(token: &str) -> String {
    warn!(token, "invalid administrative argument");
    reply::INVALID_FORMAT.to_string()
}

fn time_reply(at: Result<chrono::NaiveDateTime, ExtDbError>) -> String {
    match at {
        Ok(at) => reply::success(&clock::date_array(at)),
        Err(err) => {
            warn!(error = %err, "time offset rejected");
            reply::TIME_ERROR.to_string()
        }
    }
}
