//! End-to-end runs over raw PCM files

use std::fs::File;
use std::io::{BufReader, Write};

use crate::config_file::ConfigFile;
use crate::pack::SamplePacker;
use crate::pcm::{RawPcmSink, RawPcmSource};

#[test]
fn test_raw_file_through_packer() {
    let mut config = ConfigFile::default_config();
    config.filter.samples = 1764;
    config.filter.time_base = Some("1/44100".to_string());
    config.input.read_samples = Some(vec![1000, 333, 2048]);

    let format = config.input_format().unwrap();
    // 10 output frames plus a 100-sample tail
    let samples = 10 * 1764 + 100;
    let data: Vec<u8> = (0..samples * format.block_size())
        .map(|i| (i % 251) as u8)
        .collect();

    let mut input = tempfile::NamedTempFile::new().unwrap();
    input.write_all(&data).unwrap();

    let mut source = RawPcmSource::new(
        BufReader::new(File::open(input.path()).unwrap()),
        format,
        config.input.read_samples.clone().unwrap(),
    )
    .unwrap()
    .with_start_pts(90);

    let mut packer = SamplePacker::new(config.into_pack_config().unwrap()).unwrap();
    let mut sink = RawPcmSink::new(Vec::new());
    let stats = packer.run_to_end(&mut source, &mut sink).unwrap();

    assert_eq!(stats.output_frames, 10);
    assert_eq!(stats.discarded_samples, 100);
    assert_eq!(sink.frames_written(), 10);

    let written = sink.into_inner();
    assert_eq!(written.len(), 10 * 1764 * format.block_size());
    assert_eq!(written[..], data[..written.len()]);
}

#[test]
fn test_bypass_keeps_input_chunking() {
    let mut config = ConfigFile::default_config();
    config.filter.bypass = Some(true);
    let format = config.input_format().unwrap();
    let data = vec![7u8; 2500 * format.block_size()];

    let mut source =
        RawPcmSource::new(std::io::Cursor::new(data.clone()), format, vec![1000]).unwrap();
    let mut packer = SamplePacker::new(config.into_pack_config().unwrap()).unwrap();
    let mut sink = RawPcmSink::new(Vec::new());
    let stats = packer.run_to_end(&mut source, &mut sink).unwrap();

    // 1000 + 1000 + 500, forwarded as read
    assert_eq!(stats.output_frames, 3);
    assert_eq!(stats.discarded_samples, 0);
    assert_eq!(sink.into_inner(), data);
}
