//! Loop-mounted disk images via udisksctl.
//!
//! A [`MountedVolume`] can only be obtained from [`attach`] and is consumed by
//! [`MountedVolume::teardown`], so each successful mount is torn down exactly
//! once.

use crate::bundler::{
    builder::PackagingContext,
    error::{Error, Result},
    toolchain::{CommandRunner, ToolInvocation},
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static LOOP_DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Mapped file .* as (/dev/loop\d+)").expect("loop device regex is valid")
});

static MOUNT_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mounted .* at (.*)$").expect("mount point regex is valid"));

/// Loop device from `udisksctl loop-setup` output.
///
/// Expects `Mapped file <image> as /dev/loopN.`
pub fn parse_loop_device(output: &str) -> Result<String> {
    LOOP_DEVICE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::OutputParse {
            what: "loop device",
            output: output.to_string(),
        })
}

/// Mount point from `udisksctl mount` output.
///
/// Expects `Mounted <device> at <path>` as the last line; a trailing period
/// printed by older udisks releases is dropped.
pub fn parse_mount_point(output: &str) -> Result<PathBuf> {
    let trimmed = output.trim();
    MOUNT_POINT
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .map(|path| path.strip_suffix('.').unwrap_or(path))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| Error::OutputParse {
            what: "mount point",
            output: output.to_string(),
        })
}

/// Device to mount: the first partition when `lsblk` lists one.
pub fn partition_device(loop_device: &str, lsblk_output: &str) -> String {
    let partition = format!("{}p1", loop_device.trim_start_matches("/dev/"));
    let listed = lsblk_output
        .split_whitespace()
        .any(|name| name.trim_start_matches(|c: char| !c.is_ascii_alphanumeric()) == partition);
    if listed {
        format!("{}p1", loop_device)
    } else {
        loop_device.to_string()
    }
}

fn udisksctl(action: &str, flag: &str, target: &str) -> ToolInvocation {
    ToolInvocation::new("udisksctl").args([action, flag, target])
}

/// A disk image attached to a loop device with its filesystem mounted.
#[derive(Debug)]
pub struct MountedVolume {
    loop_device: String,
    device: String,
    mount_point: PathBuf,
}

impl MountedVolume {
    pub fn loop_device(&self) -> &str {
        &self.loop_device
    }

    /// Where the filesystem is mounted on the host.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Unmounts the filesystem and detaches the loop device.
    ///
    /// Failures are logged only.
    pub async fn teardown<R: CommandRunner>(self, ctx: &PackagingContext<R>) {
        log::debug!("Unmounting {} from {}", self.device, self.mount_point.display());
        ctx.attempt(
            &udisksctl("unmount", "-b", &self.device),
            "unmounting disk image",
        )
        .await;
        detach(ctx, &self.loop_device).await;
    }
}

async fn detach<R: CommandRunner>(ctx: &PackagingContext<R>, loop_device: &str) {
    ctx.attempt(
        &udisksctl("loop-delete", "-b", loop_device),
        "detaching loop device",
    )
    .await;
}

/// Attaches `image` and mounts its filesystem.
///
/// With `probe_partition`, a partitioned image has its first partition
/// mounted instead of the whole device. The loop device is detached again
/// when mounting fails.
pub async fn attach<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    image: &Path,
    probe_partition: bool,
) -> Result<MountedVolume> {
    let setup = ToolInvocation::new("udisksctl")
        .args(["loop-setup", "-f"])
        .path_arg(image);
    let output = ctx.require(&setup, "attaching disk image").await?;
    let loop_device = parse_loop_device(&output.stdout)?;
    log::debug!("Attached {} as {}", image.display(), loop_device);

    match mount(ctx, &loop_device, probe_partition).await {
        Ok((device, mount_point)) => Ok(MountedVolume {
            loop_device,
            device,
            mount_point,
        }),
        Err(e) => {
            detach(ctx, &loop_device).await;
            Err(e)
        }
    }
}

async fn mount<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    loop_device: &str,
    probe_partition: bool,
) -> Result<(String, PathBuf)> {
    let device = if probe_partition {
        let lsblk = ToolInvocation::new("lsblk").args(["-n", "-o", "NAME", loop_device]);
        let listing = ctx.run(&lsblk).await?;
        partition_device(loop_device, &listing.stdout)
    } else {
        loop_device.to_string()
    };

    let output = ctx
        .require(&udisksctl("mount", "-b", &device), "mounting disk image")
        .await?;
    let mount_point = parse_mount_point(&output.stdout)?;
    log::debug!("Mounted {} at {}", device, mount_point.display());
    Ok((device, mount_point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loop_device() {
        assert_eq!(
            parse_loop_device("Mapped file /tmp/out/Demo-1.0-uncompressed.dmg as /dev/loop12.\n")
                .unwrap(),
            "/dev/loop12"
        );
        for bad in ["", "Mapped file x as /dev/sda", "Error setting up loop device"] {
            assert!(matches!(
                parse_loop_device(bad),
                Err(Error::OutputParse { what: "loop device", .. })
            ));
        }
    }

    #[test]
    fn test_parse_mount_point() {
        assert_eq!(
            parse_mount_point("Mounted /dev/loop3 at /run/media/dev/Demo\n").unwrap(),
            Path::new("/run/media/dev/Demo")
        );
        assert_eq!(
            parse_mount_point("Mounted /dev/loop3 at /media/Demo.").unwrap(),
            Path::new("/media/Demo")
        );
        for bad in ["", "Mounted /dev/loop3 at ", "Object /dev/loop3 is already mounted"] {
            assert!(matches!(
                parse_mount_point(bad),
                Err(Error::OutputParse { what: "mount point", .. })
            ));
        }
    }

    #[test]
    fn test_partition_device() {
        assert_eq!(
            partition_device("/dev/loop4", "loop4\n└─loop4p1\n"),
            "/dev/loop4p1"
        );
        assert_eq!(partition_device("/dev/loop4", "loop4\n"), "/dev/loop4");
        assert_eq!(partition_device("/dev/loop1", "loop1\n`-loop14p1\n"), "/dev/loop1");
    }
}
