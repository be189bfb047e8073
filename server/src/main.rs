/*
 * Created on Thu Jul 02 2020
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2020, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # sqlited
//!
//! A minimal server binary wiring [`codec`] and [`stmt`] to a real `rusqlite`
//! connection and a `tokio` TCP accept loop. The consensus layer, authentication and
//! TLS are external collaborators this binary does not implement (§1's non-goals);
//! what is here is just enough transport to exercise the codec end to end.

mod codec;
mod config;
mod connection;
mod error;
mod registry;
mod stmt;

use config::Configuration;
use env_logger::Builder;
use std::env;
use tokio::net::TcpListener;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const CONFIG_FILE: &str = "sqlited.yaml";

fn main() {
    let config = match Configuration::load(CONFIG_FILE) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(0x100);
        }
    };
    Builder::new()
        .parse_filters(&env::var("SQLITED_LOG").unwrap_or_else(|_| config.log_filter.clone()))
        .init();
    log::info!("sqlited starting, listening on {}", config.listen);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("sqlited")
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime");
    runtime.block_on(run(config));
    log::info!("sqlited stopped accepting connections");
}

async fn run(config: Configuration) {
    let listener = match TcpListener::bind(&config.listen).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to bind {}: {e}", config.listen);
            std::process::exit(0x100);
        }
    };
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    log::error!("accept failed: {e}");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("received ctrl-c, shutting down");
                return;
            }
        };
        log::debug!("accepted connection from {peer}");
        let db_path = config.db_path.clone();
        let max_frame_words = config.max_frame_words;
        let row_soft_cap = config.row_soft_cap;
        tokio::spawn(async move {
            if let Err(e) = connection::run(socket, &db_path, max_frame_words, row_soft_cap).await
            {
                log::warn!("connection from {peer} ended with an error: {e}");
            } else {
                log::debug!("connection from {peer} closed");
            }
        });
    }
}
