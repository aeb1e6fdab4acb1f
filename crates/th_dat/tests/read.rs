use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use md5::{Digest, Md5};
use th_dat::error::{Error, FormatError, Result};
use th_dat::wave::WaveArchive;
use th_dat::{write_archive, Archive, CreateOptions, GameId, InputFile};
use tracing::info;
use tracing_test::traced_test;
use walkdir::WalkDir;

fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

fn inputs() -> Vec<InputFile> {
    vec![
        InputFile::new("op.m", vec![0x90; 600]),
        InputFile::new("stage1.dat", b"Lotus Land Story".repeat(16)),
        InputFile::new("demo1.rec", (0..=255u8).cycle().take(2000).collect()),
    ]
}

/// Expected hash of every input, by name
fn expected() -> Vec<(&'static str, String)> {
    vec![
        ("op.m", md5_hex(&[0x90; 600])),
        ("stage1.dat", md5_hex(&b"Lotus Land Story".repeat(16))),
        (
            "demo1.rec",
            md5_hex(&(0..=255u8).cycle().take(2000).collect::<Vec<_>>()),
        ),
    ]
}

fn image(game: GameId) -> Result<Vec<u8>> {
    write_archive(game, Vec::new(), &inputs(), &CreateOptions::default())
}

#[traced_test]
#[test]
fn extract_by_name() -> Result<()> {
    for game in GameId::ALL {
        info!("testing {game}");
        let mut archive = Archive::open(game, Cursor::new(image(game)?))?;
        assert_eq!(archive.len(), 3);

        for (name, hash) in expected() {
            let data = archive.extract_name(name)?;
            assert_eq!(md5_hex(&data), hash, "{game} {name}");
        }
    }
    Ok(())
}

#[test]
fn opening_twice_yields_identical_tables() -> Result<()> {
    for game in GameId::ALL {
        let image = image(game)?;
        let first = Archive::open(game, Cursor::new(&image))?;
        let second = Archive::open(game, Cursor::new(&image))?;
        assert_eq!(
            first.entries().collect::<Vec<_>>(),
            second.entries().collect::<Vec<_>>()
        );
    }
    Ok(())
}

#[test]
fn wrong_game_is_format_error() -> Result<()> {
    let pbg = image(GameId::Th06)?;
    for game in [GameId::Th01, GameId::Th02, GameId::Th04, GameId::Th075] {
        let result = Archive::open(game, Cursor::new(&pbg));
        assert!(matches!(result, Err(Error::FormatError(_))), "{game}");
    }

    assert!(matches!(
        Archive::open(GameId::Th06, Cursor::new(b"PBG4".repeat(8))),
        Err(Error::FormatError(FormatError::Signature("PBG3")))
    ));
    Ok(())
}

#[test]
fn corrupt_payload_fails_checksum() -> Result<()> {
    let mut image = image(GameId::Th06)?;
    image[16] ^= 0x01;

    let mut archive = Archive::open(GameId::Th06, Cursor::new(image))?;
    assert!(matches!(
        archive.extract_index(0),
        Err(Error::FormatError(FormatError::Checksum { .. }))
    ));
    Ok(())
}

#[traced_test]
#[test]
fn lower_bound_entry_is_not_truncated() -> Result<()> {
    let files = [InputFile::new("stage1.dat", vec![0x41; 40])];
    let mut image = write_archive(GameId::Th02, Vec::new(), &files, &CreateOptions::default())?;

    // size field of the first record
    assert_eq!(u16::from_le_bytes([image[18], image[19]]), 40);
    image[18..20].copy_from_slice(&10u16.to_le_bytes());

    let mut archive = Archive::open(GameId::Th02, Cursor::new(image))?;
    assert_eq!(archive.by_name("stage1.dat")?.size, 10);
    assert_eq!(archive.extract_name("stage1.dat")?, vec![0x41; 40]);
    assert!(logs_contain("entry decoded to more bytes than recorded"));
    Ok(())
}

#[test]
fn exact_entry_rejects_longer_output() -> Result<()> {
    let files = [InputFile::new("data/csv/story.cv1", vec![0x41; 40])];
    let mut image = write_archive(GameId::Th075, Vec::new(), &files, &CreateOptions::default())?;

    // the table is XORed with a keystream, so the size is patched through its bits
    image[2 + 100] ^= 40 ^ 10;

    let mut archive = Archive::open(GameId::Th075, Cursor::new(image))?;
    assert_eq!(archive.by_index(0)?.size, 10);
    assert!(matches!(
        archive.extract_index(0),
        Err(Error::FormatError(FormatError::SizeMismatch { expected: 10, .. }))
    ));
    Ok(())
}

#[traced_test]
#[test]
fn extract_to_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let files = vec![
        InputFile::new("data/character/reimu/stand.cv2", vec![0x20; 700]),
        InputFile::new("data/csv/system/cardlist.cv1", b"100,1,2\n".repeat(40)),
    ];
    let image = write_archive(GameId::Th075, Vec::new(), &files, &CreateOptions::default())?;
    Archive::open(GameId::Th075, Cursor::new(image))?.extract_to(dir.path())?;

    let mut extracted: Vec<PathBuf> = WalkDir::new(dir.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    extracted.sort();
    assert_eq!(
        extracted,
        vec![
            PathBuf::from("data/character/reimu/stand.cv2"),
            PathBuf::from("data/csv/system/cardlist.cv1"),
        ]
    );

    let stand = fs::read(dir.path().join("data/character/reimu/stand.cv2"))?;
    assert_eq!(md5_hex(&stand), md5_hex(&[0x20; 700]));
    Ok(())
}

#[test]
fn wave_bank_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("voice.dat");
    let files = vec![
        InputFile::new("reimu_01.wav", b"RIFF....WAVEfmt ".to_vec()),
        InputFile::new("marisa_01.wav", vec![0x7F; 333]),
    ];

    assert!(matches!(
        WaveArchive::create(&path, &files, 3),
        Err(Error::FormatError(FormatError::CountMismatch { declared: 3, actual: 2 }))
    ));
    WaveArchive::create(&path, &files, 2)?;

    let mut bank = WaveArchive::open(fs::File::open(&path)?)?;
    assert_eq!(bank.len(), 2);
    for file in &files {
        let entry = bank.by_name(&file.name)?.clone();
        assert_eq!(entry.size, file.data.len() as u64);
        assert_eq!(bank.extract(&entry)?, file.data);
    }

    let out = dir.path().join("voice");
    bank.extract_to(&out)?;
    assert_eq!(fs::read(out.join("marisa_01.wav"))?, vec![0x7F; 333]);
    Ok(())
}

#[cfg(feature = "tokio")]
mod asynchronous {
    use pretty_assertions::assert_eq;
    use th_dat::error::Result;
    use th_dat::{create_async, open_async, CreateOptions, CreateSource, GameId};

    #[tokio::test]
    async fn create_and_extract() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source");
        tokio::fs::create_dir_all(source.join("bgm")).await?;
        tokio::fs::write(source.join("bgm").join("th06_01.mid"), vec![0x4D; 900]).await?;
        tokio::fs::write(source.join("stage1.ecl"), b"ecl".repeat(100)).await?;

        let output = dir.path().join("th06.dat");
        create_async(
            GameId::Th06,
            &output,
            &CreateSource::Directory(source),
            &CreateOptions::default(),
        )
        .await?;

        let mut archive = open_async(GameId::Th06, &output).await?;
        assert_eq!(
            archive.file_names().collect::<Vec<_>>(),
            vec!["bgm/th06_01.mid", "stage1.ecl"]
        );
        let entry = archive.by_name("stage1.ecl")?.clone();
        assert_eq!(archive.extract(&entry).await?, b"ecl".repeat(100));

        let out = dir.path().join("out");
        archive.extract_to(&out).await?;
        assert_eq!(
            tokio::fs::read(out.join("bgm").join("th06_01.mid")).await?,
            vec![0x4D; 900]
        );
        Ok(())
    }
}
