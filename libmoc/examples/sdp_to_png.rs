use anyhow::Context;
use libmoc::{DecodeOptions, MocImage};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().context("usage: sdp_to_png <input.sdp> [output.png]")?;
    let output = args.next().unwrap_or_else(|| format!("{input}.png"));

    let image = MocImage::from_file(&input, &DecodeOptions::default())?;
    println!(
        "{input}: {}x{} {} image, status {}",
        image.width(),
        image.height(),
        image.mode().as_str(),
        image.status()
    );
    image.save(&output)?;
    image.write_label(format!("{output}.lbl"))?;
    Ok(())
}
