use std::fs::File;
use std::io::Read;

use atsc::filters::psip::{ChannelMap, Listener};
use atsc::psi::table::{EitItem, VctItem};
use atsc::{Correlator, Pid, PsipDemuxer};

#[derive(Default)]
struct Counter {
    pids: Vec<Pid>,
    vct_updates: u64,
    eit_sections: u64,
    events: u64,
}

impl Listener for Counter {
    fn on_pid_discovered(&mut self, pid: Pid) {
        self.pids.push(pid);
    }

    fn on_channel_events_decoded(&mut self, _: &VctItem, events: Vec<EitItem>) {
        self.eit_sections += 1;
        self.events += events.len() as u64;
    }

    fn on_channels_updated(&mut self, _: &ChannelMap) {
        self.vct_updates += 1;
    }
}

const HELP: &str = "\
PSIPのパケットやセクションを数えるコマンド

USAGE:
  count [PATH]

FLAGS:
  -h, --help このヘルプを表示する

ARGS:
  <PATH>     パケットを数えるTSファイルのパス
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let path: std::path::PathBuf = args.free_from_str()?;

    env_logger::init();

    let mut f = File::open(path)?;

    let mut demuxer = PsipDemuxer::new(Correlator::new(Counter::default()));
    let mut buf = vec![0; 188 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        demuxer.feed(&buf[..n]);
    }

    let stats = demuxer.stats().clone();
    let correlator = demuxer.into_filter();
    let psip_stats = correlator.stats().clone();
    let channels = correlator.channels().len();
    let counter = correlator.into_listener();

    println!("Input Packets   : {:9}", stats.packets);
    println!("Format Error    : {:9}", stats.format_errors);
    println!("Transport Error : {:9}", stats.transport_errors);
    println!("Dropped         : {:9}", stats.discontinuities);
    println!("CRC Error       : {:9}", stats.crc_errors);
    println!("Corrupted       : {:9}", stats.corrupted);
    println!("Broken Table    : {:9}", psip_stats.broken_tables);
    println!("Uncorrelated EIT: {:9}", psip_stats.uncorrelated_eits);
    println!();
    println!("Channels        : {:9}", channels);
    println!("VCT Updates     : {:9}", counter.vct_updates);
    println!("EIT Sections    : {:9}", counter.eit_sections);
    println!("Events          : {:9}", counter.events);
    println!();
    println!(" PID");
    for pid in &counter.pids {
        println!("{:04X}", pid);
    }

    Ok(())
}
