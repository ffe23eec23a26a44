// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Defaults for the Atmel SAM3X family (e.g. the Arduino Due's SAM3X8E)

use super::Window;

/// Window covering all peripherals, including the system controller
pub const MMIO_WINDOW: Window = Window::new(0x4000_0000, 0x2000_0000);

/// Names of the CMSIS register block types of SAM3X peripherals
pub const PERIPHERAL_TYPES: &[&str] = &[
    "Adc",
    "Can",
    "Chipid",
    "Dacc",
    "Dmac",
    "Efc",
    "Emac",
    "Gpbr",
    "Hsmci",
    "Matrix",
    "NVIC_Type",
    "Pdc",
    "Pio",
    "Pmc",
    "Pwm",
    "Rstc",
    "Rtc",
    "Rtt",
    "SCB_Type",
    "Smc",
    "Spi",
    "Ssc",
    "Supc",
    "SysTick_Type",
    "Tc",
    "TcChannel",
    "Trng",
    "Twi",
    "Uart",
    "Uotghs",
    "Usart",
    "Wdt",
];

/// Interrupt handler names and their interrupt numbers
pub const INTERRUPT_HANDLERS: &[(&str, u32)] = &[
    ("SUPC_Handler", 0),
    ("RSTC_Handler", 1),
    ("RTC_Handler", 2),
    ("RTT_Handler", 3),
    ("WDT_Handler", 4),
    ("PMC_Handler", 5),
    ("EFC0_Handler", 6),
    ("EFC1_Handler", 7),
    ("UART_Handler", 8),
    ("SMC_Handler", 9),
    ("PIOA_Handler", 11),
    ("PIOB_Handler", 12),
    ("PIOC_Handler", 13),
    ("PIOD_Handler", 14),
    ("USART0_Handler", 17),
    ("USART1_Handler", 18),
    ("USART2_Handler", 19),
    ("USART3_Handler", 20),
    ("HSMCI_Handler", 21),
    ("TWI0_Handler", 22),
    ("TWI1_Handler", 23),
    ("SPI0_Handler", 24),
    ("SSC_Handler", 26),
    ("TC0_Handler", 27),
    ("TC1_Handler", 28),
    ("TC2_Handler", 29),
    ("TC3_Handler", 30),
    ("TC4_Handler", 31),
    ("TC5_Handler", 32),
    ("TC6_Handler", 33),
    ("TC7_Handler", 34),
    ("TC8_Handler", 35),
    ("PWM_Handler", 36),
    ("ADC_Handler", 37),
    ("DACC_Handler", 38),
    ("DMAC_Handler", 39),
    ("UOTGHS_Handler", 40),
    ("TRNG_Handler", 41),
    ("EMAC_Handler", 42),
    ("CAN0_Handler", 43),
    ("CAN1_Handler", 44),
];

/// Memory region occupied by a single peripheral
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    /// First address of the region
    pub start: u64,
    /// First address past the region
    pub end: u64,
}

impl Region {
    const fn new(name: &'static str, start: u64, end: u64) -> Self {
        Self { name, start, end }
    }

    /// Check whether the given address lies within this region
    pub const fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }
}

/// Peripheral regions, sorted by address
pub const REGIONS: &[Region] = &[
    Region::new("HSMCI", 0x4000_0000, 0x4000_4000),
    Region::new("SSC", 0x4000_4000, 0x4000_8000),
    Region::new("SPI0", 0x4000_8000, 0x4000_C000),
    Region::new("SPI1", 0x4000_C000, 0x4008_0000),
    Region::new("TC0", 0x4008_0000, 0x4008_4000),
    Region::new("TC1", 0x4008_4000, 0x4008_8000),
    Region::new("TC2", 0x4008_8000, 0x4008_C000),
    Region::new("TWI0", 0x4008_C000, 0x4009_0000),
    Region::new("TWI1", 0x4009_0000, 0x4009_4000),
    Region::new("PWM", 0x4009_4000, 0x4009_8000),
    Region::new("USART0", 0x4009_8000, 0x4009_C000),
    Region::new("USART1", 0x4009_C000, 0x400A_0000),
    Region::new("USART2", 0x400A_0000, 0x400A_4000),
    Region::new("USART3", 0x400A_4000, 0x400A_8000),
    Region::new("Reserved0", 0x400A_8000, 0x400A_C000),
    Region::new("UOTGHS", 0x400A_C000, 0x400B_0000),
    Region::new("EMAC", 0x400B_0000, 0x400B_4000),
    Region::new("CAN0", 0x400B_4000, 0x400B_8000),
    Region::new("CAN1", 0x400B_8000, 0x400B_C000),
    Region::new("TRNG", 0x400B_C000, 0x400C_0000),
    Region::new("ADC", 0x400C_0000, 0x400C_4000),
    Region::new("DMAC", 0x400C_4000, 0x400C_8000),
    Region::new("DACC", 0x400C_8000, 0x400D_0000),
    Region::new("Reserved1", 0x400D_0000, 0x400E_0000),
    Region::new("SMC", 0x400E_0000, 0x400E_0200),
    Region::new("SDRAM", 0x400E_0200, 0x400E_0400),
    Region::new("MATRIX", 0x400E_0400, 0x400E_0600),
    Region::new("PMC", 0x400E_0600, 0x400E_0800),
    Region::new("UART", 0x400E_0800, 0x400E_0940),
    Region::new("CHIPID", 0x400E_0940, 0x400E_0A00),
    Region::new("EEFC0", 0x400E_0A00, 0x400E_0C00),
    Region::new("EEFC1", 0x400E_0C00, 0x400E_0E00),
    Region::new("PIOA", 0x400E_0E00, 0x400E_1000),
    Region::new("PIOB", 0x400E_1000, 0x400E_1200),
    Region::new("PIOC", 0x400E_1200, 0x400E_1400),
    Region::new("PIOD", 0x400E_1400, 0x400E_1600),
    Region::new("PIOE", 0x400E_1600, 0x400E_1800),
    Region::new("PIOF", 0x400E_1800, 0x400E_1A00),
    Region::new("RSTC", 0x400E_1A00, 0x400E_1A10),
    Region::new("SUPC", 0x400E_1A10, 0x400E_1A30),
    Region::new("RTT", 0x400E_1A30, 0x400E_1A50),
    Region::new("WDT", 0x400E_1A50, 0x400E_1A60),
    Region::new("RTC", 0x400E_1A60, 0x400E_1A90),
    Region::new("GPBR", 0x400E_1A90, 0x400E_1AB0),
    Region::new("Reserved2", 0x400E_1AB0, 0x400E_2600),
];

/// Retrieve the [`Region`] containing the given address
pub fn region_at(address: u64) -> Option<&'static Region> {
    let idx = REGIONS.partition_point(|r| r.end <= address);
    REGIONS.get(idx).filter(|r| r.contains(address))
}

/// Retrieve the name of the peripheral owning the given address
pub fn peripheral_at(address: u64) -> Option<&'static str> {
    region_at(address).map(|r| r.name)
}
