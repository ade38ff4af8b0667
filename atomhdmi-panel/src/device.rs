use atomhdmi_gowin::{LoadReport, Loader};
use atomhdmi_io::{Clock, Hex, Pins, RegisterBus, SerialBus, TapController};
use eyre::Result;
use tracing::{info, instrument, warn};

use crate::{ChipId, Panel, PanelConfig, Transmitter, TransmitterConfig, TransmitterError};

/// What [`Device::init`] found along the way.
#[derive(Debug)]
pub struct BringupReport {
    /// `None` when the ID could not be read.
    pub chip_id: Option<ChipId>,
    /// Why the transmitter is not running, if it is not.
    pub transmitter_error: Option<TransmitterError>,
    pub load: LoadReport,
    pub fpga_id: u32,
}

impl BringupReport {
    pub fn is_locked(&self) -> bool {
        self.transmitter_error.is_none()
    }
}

/// The whole module: FPGA framebuffer on the serial bus, transmitter on the
/// register bus.
pub struct Device<S, R, C> {
    panel: Panel<S, C>,
    transmitter: Transmitter<R, C>,
    clock: C,
}

impl<S: SerialBus, R: RegisterBus, C: Clock + Clone> Device<S, R, C> {
    pub fn new(bus: S, regs: R, clock: C, panel: PanelConfig, transmitter: TransmitterConfig) -> Self {
        Self {
            panel: Panel::new(bus, clock.clone(), panel),
            transmitter: Transmitter::new(regs, clock.clone(), transmitter),
            clock,
        }
    }

    pub fn panel(&self) -> &Panel<S, C> {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut Panel<S, C> {
        &mut self.panel
    }

    pub fn transmitter(&self) -> &Transmitter<R, C> {
        &self.transmitter
    }

    pub fn into_parts(self) -> (Panel<S, C>, Transmitter<R, C>) {
        (self.panel, self.transmitter)
    }

    /// Power-on sequence. `pins` drive the FPGA's programming port and are
    /// released once the image is loaded.
    ///
    /// A transmitter that fails to come up is logged and recorded in the
    /// report. Bus and pin errors are returned.
    #[instrument(skip_all)]
    pub fn init<P: Pins>(&mut self, pins: P, loader: &Loader<'_>) -> Result<BringupReport> {
        info!(config = ?self.panel.config(), "bringing up HDMI output");

        let chip_id = match self.transmitter.read_chip_id() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("{e}");
                None
            }
        };
        if chip_id.is_none_or(ChipId::is_uniform) {
            info!("HDMI transmitter not answering, probing");
            if let Err(e) = self.transmitter.probe() {
                warn!("probe failed: {e:#}");
            }
        }

        info!("resetting HDMI transmitter");
        if let Err(e) = self.transmitter.reset() {
            warn!("{e}");
        }

        let mut tap = TapController::new(pins)?;
        let load = loader.load(&mut tap, &mut self.clock)?;
        drop(tap);

        let PanelConfig {
            rotation,
            color_depth,
            ..
        } = *self.panel.config();
        self.panel.set_rotation(rotation);
        self.panel.set_color_depth(color_depth.bits());

        info!("initializing HDMI transmitter");
        let transmitter_error = self.transmitter.init().err();

        let fpga_id = self.panel.read_fpga_id()?;
        info!(
            chip = %chip_id.map(|id| id.to_string()).unwrap_or_default(),
            fpga = %Hex(fpga_id),
            locked = transmitter_error.is_none(),
            "bring-up finished"
        );

        Ok(BringupReport {
            chip_id,
            transmitter_error,
            load,
            fpga_id,
        })
    }
}
