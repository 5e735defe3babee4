//! Canned switch console output

pub const PROMPT: &str = "Console#";
pub const PAGINATION: &str = "Type <CR> to continue, Q<CR> to stop:";
pub const QUERY: &str = "show interfaces status all";

/// `show interfaces status all` split at its two pagination markers
pub const STATUS_PAGES: [&str; 3] = [
    "show interfaces status all\r\n\
     \r\n\
     Port     Name       Link    Speed   Duplex  Type\r\n\
     -------- ---------- ------- ------- ------- ------\r\n\
     0/1      uplink     Down    Auto    Auto    10G\r\n\
     0/2      -          Down    Auto    Auto    10G\r\n\
     0/3      mgmt       Down    1000    Full    1G\r\n",
    "\r\n\
     0/24     node-a     Up      10G     Full    10G\r\n\
     0/25     node-b     Up      10G     Full    10G\r\n",
    "\r\n\
     0/26     -          Down    Auto    Auto    10G\r\n\
     1/1      spine      Up      40G     Full    40G\r\n\
     \r\n",
];

/// Ports and states contained in [`STATUS_PAGES`], in page order
pub const STATUS_PORTS: [(&str, &str); 7] = [
    ("0/1", "Down"),
    ("0/2", "Down"),
    ("0/3", "Down"),
    ("0/24", "Up"),
    ("0/25", "Up"),
    ("0/26", "Down"),
    ("1/1", "Up"),
];
