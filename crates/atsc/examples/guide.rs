use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;

use atsc::filters::psip::{Listener, Options};
use atsc::psi::table::{EitItem, VctItem};
use atsc::types::SourceId;
use atsc::{Correlator, Pid, PsipDemuxer};
use fxhash::FxHashMap;

#[derive(Default)]
struct Guide {
    channels: Vec<VctItem>,
    events: FxHashMap<SourceId, BTreeMap<u16, EitItem>>,
}

impl Listener for Guide {
    fn on_pid_discovered(&mut self, pid: Pid) {
        println!("EIT PID: {:?}", pid);
    }

    fn on_channel_events_decoded(&mut self, channel: &VctItem, events: Vec<EitItem>) {
        match self
            .channels
            .iter_mut()
            .find(|ch| ch.source_id == channel.source_id)
        {
            Some(ch) => *ch = channel.clone(),
            None => self.channels.push(channel.clone()),
        }

        let map = self.events.entry(channel.source_id).or_default();
        for event in events {
            map.insert(event.event_id, event);
        }
    }
}

const HELP: &str = "\
番組表を表示するコマンド

USAGE:
  guide [OPTIONS] [PATH]

FLAGS:
  -h, --help             このヘルプを表示する

OPTIONS:
  --chunk-size <BYTES>   一度に読み込むバイト数 [default: 4096]
  --gps-utc-offset <SEC> GPSとUTCの差の秒数 [default: 18]
  --eit-count <N>        読み取るEITの数 [default: 1]

ARGS:
  <PATH>                 番組表を表示するTSファイルのパス
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let chunk_size: usize = args.opt_value_from_str("--chunk-size")?.unwrap_or(4096);
    let gps_utc_offset: u8 = args.opt_value_from_str("--gps-utc-offset")?.unwrap_or(18);
    let eit_count: u8 = args.opt_value_from_str("--eit-count")?.unwrap_or(1);
    let path: std::path::PathBuf = args.free_from_str()?;

    env_logger::init();

    let mut f = File::open(path)?;

    let options = Options {
        eit_count,
        ..Default::default()
    };
    let mut demuxer = PsipDemuxer::new(Correlator::with_options(Guide::default(), options));

    let mut buf = vec![0; chunk_size.max(1)];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        demuxer.feed(&buf[..n]);
    }

    let guide = demuxer.into_filter().into_listener();
    for channel in &guide.channels {
        println!(
            "{} {} (program {})",
            channel.channel_number(),
            channel.short_name,
            channel.program_number
        );

        let Some(events) = guide.events.get(&channel.source_id) else {
            continue;
        };
        let mut events: Vec<&EitItem> = events.values().collect();
        events.sort_unstable_by_key(|ev| ev.start_time);

        for event in events {
            let unix = event.start_time.to_unix(gps_utc_offset);
            let Some(start_dt) = chrono::NaiveDateTime::from_timestamp_opt(unix, 0) else {
                continue;
            };
            let duration = chrono::Duration::seconds(event.duration as i64);

            println!("\t{} - {} {}", start_dt, start_dt + duration, event.title);
        }
    }

    Ok(())
}
