use assert_cmd::Command;
use std::error::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Write a captured ICY stream for testing.
///
/// The capture is synthesised on the fly: a Shoutcast-style header block
/// followed by `metaint`-sized audio segments, each trailed by a metadata
/// block for the given title (or an empty block for `None`).
fn write_capture<P: AsRef<Path>>(
    path: P,
    metaint: usize,
    titles: &[Option<&str>],
) -> Result<(), Box<dyn Error>> {
    let mut data = format!(
        "ICY 200 OK\r\nicy-name: CLI Radio\r\ncontent-type: audio/mpeg\r\nicy-metaint: {metaint}\r\n\r\n"
    )
    .into_bytes();

    for (index, title) in titles.iter().enumerate() {
        data.extend(std::iter::repeat(b'0' + (index % 10) as u8).take(metaint));
        match title {
            Some(title) => {
                let text = format!("StreamTitle='{title}';StreamUrl='';");
                let units = text.len().div_ceil(16);
                data.push(units as u8);
                data.extend_from_slice(text.as_bytes());
                data.resize(data.len() + units * 16 - text.len(), 0);
            }
            None => data.push(0),
        }
    }

    fs::write(path, data)?;
    Ok(())
}

fn file_names(dir: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let mut names: Vec<_> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    Ok(names)
}

#[test]
fn cli_records_capture_into_track_files() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("capture.icy");
    write_capture(
        &input_path,
        64,
        &[Some("Band - Opener"), None, Some("Band - Closer"), None],
    )?;

    let output_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("icyrip")?;
    let assert = cmd
        .arg("--output")
        .arg(output_dir.path())
        .args(["--buffer-size", "100"])
        .arg(&input_path)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(
        stdout.contains("Recorded 3 file(s)"),
        "unexpected stdout: {stdout}"
    );

    assert_eq!(
        file_names(output_dir.path())?,
        vec![
            "0000 CLI Radio.mp3",
            "0001 Band - Opener.mp3",
            "0002 Band - Closer.mp3",
        ]
    );
    let closer = fs::read(output_dir.path().join("0002 Band - Closer.mp3"))?;
    assert_eq!(closer, vec![b'3'; 64]);

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn cli_honours_max_size() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("capture.icy");
    write_capture(&input_path, 100, &[Some("A - B"), None, None])?;

    let output_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("icyrip")?;
    let assert = cmd
        .arg("-o")
        .arg(output_dir.path())
        .args(["--max-size", "150b"])
        .arg(&input_path)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("size limit reached"), "unexpected stdout: {stdout}");

    let total: u64 = fs::read_dir(output_dir.path())?
        .map(|entry| entry.and_then(|e| e.metadata()).map(|meta| meta.len()))
        .sum::<Result<u64, _>>()?;
    assert_eq!(total, 150);

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn cli_reads_from_stdin() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("capture.icy");
    write_capture(&input_path, 8, &[Some("Solo")])?;

    let output_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("icyrip")?;
    cmd.arg("-o")
        .arg(output_dir.path())
        .arg("-")
        .write_stdin(fs::read(&input_path)?)
        .assert()
        .success();

    assert_eq!(
        file_names(output_dir.path())?,
        vec!["0000 CLI Radio.mp3", "0001 Solo.mp3"]
    );

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn cli_reports_missing_input_file() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;

    let mut cmd = Command::cargo_bin("icyrip")?;
    let assert = cmd
        .arg("--output")
        .arg(output_dir.path())
        .arg("missing.icy")
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(
        stderr.contains("input file does not exist"),
        "stderr did not mention the missing file: {stderr}"
    );

    output_dir.close()?;
    Ok(())
}

#[test]
fn cli_reports_streams_without_metaint() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("plain.mp3");
    fs::write(&input_path, b"HTTP/1.0 200 OK\r\ncontent-type: audio/mpeg\r\n\r\nabc")?;

    let output_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("icyrip")?;
    let assert = cmd
        .arg("--output")
        .arg(output_dir.path())
        .arg(&input_path)
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("Icy-Metaint"), "unexpected stderr: {stderr}");

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn cli_rejects_invalid_sizes() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("icyrip")?;
    let assert = cmd
        .args(["--max-size", "lots", "-"])
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("--max-size"), "unexpected stderr: {stderr}");
    Ok(())
}
