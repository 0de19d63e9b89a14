/*
 *  main.rs
 *
 *  vkredirect - bring your own driver
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::process::ExitCode;
use anyhow::Context;
use env_logger::Env;
use log::{info, warn};

use vkredirect::config;
use vkredirect::hook;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// One attempt; `Ok(false)` means the platform driver stays in charge
fn run() -> anyhow::Result<bool> {
    let cfg = config::load().context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("vkredirect v{} {} (built {})", env!("CARGO_PKG_VERSION"), BUILD_TARGET, BUILD_DATE);

    let hook_cfg = cfg.hook.as_ref().context("no hook configuration")?;
    let request = hook_cfg.request()?;

    let outcome = hook::hook_system_driver(hook_cfg.primitive_library.as_deref(), &request);
    match outcome.handle() {
        Some(handle) => info!("Replacement driver {} loaded, handle {}", request.driver_file_name, handle),
        None => warn!("Driver not substituted, continuing with the platform default Vulkan driver"),
    }

    Ok(outcome.succeeded())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("vkredirect: {:#}", e);
            ExitCode::from(1)
        }
    }
}
