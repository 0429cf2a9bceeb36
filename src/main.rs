mod cli;
mod collector;
mod config;
mod filter;
mod record;
mod render;
mod style;
mod table;
mod tree;
mod watch;

use std::io::{IsTerminal, Write};

use anyhow::Context;
use env_logger::Env;

use crate::{
    cli::Settings,
    collector::Collector,
    config::Config,
    render::render_forest,
    style::RenderParams,
    tree::Forest,
};

fn main() {
    env_logger::Builder::from_env(Env::new().filter_or("PSTREE_LOG", "warn")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match cli::parse_args(&argv) {
        Ok(args) => args,
        Err(err) => usage_exit(err),
    };
    if args.help {
        println!("{}", cli::usage());
        return;
    }

    let config = Config::load();
    let settings = match args.into_settings(&config) {
        Ok(settings) => settings,
        Err(err) => usage_exit(err),
    };

    match run(&settings, config) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    }
}

fn usage_exit(err: cli::UsageError) -> ! {
    eprintln!("pstree: {err}\n\n{}", cli::usage());
    std::process::exit(2)
}

///single shot exits 1 when nothing was printed
fn run(settings: &Settings, config: Config) -> anyhow::Result<i32> {
    let collector = settings.collector.build();
    let params = RenderParams {
        indent: settings.indent,
        glyphs: config.glyphs,
        styles: config.styles,
        max_width: None,
        show_started: None,
    };

    if settings.watch {
        watch::run(collector.as_ref(), settings, &params)?;
        return Ok(0);
    }

    let params = RenderParams {
        max_width: terminal_width(),
        ..params
    };
    let output = render_once(collector.as_ref(), settings, &params)?;
    let mut stdout = std::io::stdout();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(if output.is_empty() { 1 } else { 0 })
}

/// One full pass: snapshot, forest, text.
pub(crate) fn render_once(
    collector: &dyn Collector,
    settings: &Settings,
    params: &RenderParams,
) -> anyhow::Result<String> {
    let snapshot = collector.snapshot().context("collecting processes")?;
    let params = RenderParams {
        show_started: settings.show_started.then_some(snapshot.taken_at),
        ..params.clone()
    };

    let forest = Forest::build(snapshot.records, snapshot.collector_pid);
    for pid in &settings.filters.exclude_pids {
        if forest.find(*pid).is_none() {
            log::debug!("excluded pid {pid} is not running");
        }
    }
    Ok(render_forest(&forest, &settings.filters, &params))
}

pub(crate) fn terminal_width() -> Option<usize> {
    if !std::io::stdout().is_terminal() {
        return None;
    }
    crossterm::terminal::size()
        .ok()
        .map(|(columns, _)| columns as usize)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::{
        collector::{CollectError, Snapshot},
        filter::Filters,
        record::ProcessRecord,
        style::Styles,
        tree::tests::rec,
    };

    struct FixedCollector(Vec<ProcessRecord>, Option<i64>);

    impl Collector for FixedCollector {
        fn snapshot(&self) -> Result<Snapshot, CollectError> {
            Ok(Snapshot {
                records: self.0.clone(),
                collector_pid: self.1,
                taken_at: NaiveDateTime::default(),
            })
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn snapshot(&self) -> Result<Snapshot, CollectError> {
            Err(CollectError::Shape("boom".to_string()))
        }
    }

    fn settings(filters: Filters) -> Settings {
        Settings {
            watch: false,
            interval: std::time::Duration::from_secs(1),
            collector: collector::CollectorKind::Ps,
            indent: 4,
            show_started: false,
            filters,
        }
    }

    fn plain() -> RenderParams {
        RenderParams {
            styles: Styles::plain(),
            ..Default::default()
        }
    }

    #[test]
    fn pass_drops_the_listing_process() {
        let collector = FixedCollector(
            vec![
                rec(1, 1, "root", "/sbin/init"),
                rec(50, 1, "alice", "/bin/bash"),
                rec(60, 50, "alice", "ps -e"),
            ],
            Some(60),
        );
        let out = render_once(&collector, &settings(Filters::default()), &plain()).unwrap();
        assert_eq!(
            out,
            "1 (PGID: 1) 1024 root /sbin/init\n└──── 50 (PGID: 50) 1024 alice /bin/bash\n"
        );
    }

    #[test]
    fn pass_with_nothing_visible_is_empty() {
        let collector = FixedCollector(vec![rec(1, 1, "root", "init")], None);
        let filters = Filters {
            include_users: HashSet::from(["nobody".to_string()]),
            ..Default::default()
        };
        let out = render_once(&collector, &settings(filters), &plain()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn collector_failure_aborts_the_pass() {
        let err = render_once(&FailingCollector, &settings(Filters::default()), &plain())
            .unwrap_err();
        assert!(format!("{err:?}").contains("boom"));
    }

    #[test]
    fn start_times_use_snapshot_time() {
        let mut init = rec(1, 1, "root", "init");
        init.elapsed = Some(std::time::Duration::from_secs(60));
        let collector = FixedCollector(vec![init], None);
        let mut s = settings(Filters::default());
        s.show_started = true;
        let out = render_once(&collector, &s, &plain()).unwrap();
        //epoch minus a minute
        assert!(out.contains("1969-12-31 23:59:00"), "{out}");
    }
}
