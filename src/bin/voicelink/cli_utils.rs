use anyhow::Result;
use voicelink::audio;
use voicelink::SessionStats;

/// Comma-separated device names that stand in for real hardware in tests.
const TEST_DEVICES_ENV: &str = "VOICELINK_TEST_DEVICES";

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = if let Ok(raw) = std::env::var(TEST_DEVICES_ENV) {
        parse_device_list(&raw)
    } else {
        audio::Recorder::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

/// One pipe-delimited summary line, printed on stderr when the session ends.
pub(crate) fn format_session_stats(
    stream_id: &str,
    stats: &SessionStats,
    bytes_written: u64,
    capture_dropped_frames: usize,
) -> String {
    format!(
        "voicelink_stats|stream_id={stream_id}|frames={}|empty_frames={}|host_samples={}|target_samples={}|chunks={}|chunks_dropped={}|bytes={}|bytes_written={bytes_written}|capture_dropped_frames={capture_dropped_frames}|last_input_db={:.1}|last_output_db={:.1}",
        stats.frames,
        stats.empty_frames,
        stats.host_samples,
        stats.target_samples,
        stats.chunks_emitted,
        stats.chunks_dropped,
        stats.bytes_emitted,
        stats.last_input_db,
        stats.last_output_db,
    )
}
